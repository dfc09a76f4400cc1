use experiences_partner_lib::bootstrap;
use experiences_partner_lib::models::partner::PartnerRegistration;

#[test]
fn bootstrap_runs_under_a_host_subscriber() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .try_init()
        .expect("host subscriber");

    let dir = tempfile::tempdir().expect("temp dir");
    let first = bootstrap(dir.path()).expect("first bootstrap");
    let second = bootstrap(dir.path()).expect("second bootstrap");

    first
        .partners()
        .register(PartnerRegistration {
            listing_id: "listing-host".into(),
            owner_id: "host-1".into(),
        })
        .expect("register");
    let standing = second.partners().standing("listing-host").expect("standing");
    assert_eq!(standing.commission, 15);
}
