//! Exercises writing signed artifacts to disk, the same path the golden
//! fixture generator binaries take, against a scratch directory.

use forge_harness::emitter::{emit, TemplateVersions};
use forge_kernel::fingerprint;

#[test]
fn signed_artifact_round_trips_through_disk() {
    let dir = tempfile::tempdir().expect("create scratch dir");
    let fp = fingerprint::compute(b"{}", b"{}", b"{}", "gen-1.0.0");
    let versions = TemplateVersions {
        generator: "forge-harness@0.0.1".into(),
        template: "identity.rs.hbs@1".into(),
    };

    let signed = emit(
        "Identity/OrderId.g.cs",
        "pub struct OrderId(pub String);\n",
        "gpt-forge-1",
        fp,
        &versions,
    );

    let path = dir.path().join("OrderId.g.cs");
    std::fs::write(&path, &signed.body).expect("write artifact");
    let read_back = std::fs::read_to_string(&path).expect("read artifact back");

    assert_eq!(read_back, signed.body);
    assert!(read_back.starts_with(&signed.header_line));
}
