//! Generates the `NetVulnService` gRPC stubs.
//!
//! The messages are plain `prost` structs in `src/transport/proto.rs`, so the
//! service is described here with tonic-build's manual builder and no `protoc`
//! is needed. `proto/netvuln.proto` is the matching wire contract.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let check_vuln = tonic_build::manual::Method::builder()
        .name("check_vuln")
        .route_name("CheckVuln")
        .input_type("crate::transport::proto::CheckVulnRequest")
        .output_type("crate::transport::proto::CheckVulnResponse")
        .codec_path("tonic::codec::ProstCodec")
        .build();

    let service = tonic_build::manual::Service::builder()
        .name("NetVulnService")
        .package("netvuln.v1")
        .method(check_vuln)
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);
}
