//! Wire messages of `netvuln.v1.NetVulnService`.
//!
//! Field tags follow `proto/netvuln.proto`. The client and server stubs are
//! generated by `build.rs` and included at the bottom of this module.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckVulnRequest {
    #[prost(string, repeated, tag = "1")]
    pub targets: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(int32, repeated, tag = "2")]
    pub tcp_ports: ::prost::alloc::vec::Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckVulnResponse {
    #[prost(message, repeated, tag = "1")]
    pub results: ::prost::alloc::vec::Vec<TargetResult>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TargetResult {
    #[prost(string, tag = "1")]
    pub target: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub services: ::prost::alloc::vec::Vec<Service>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Service {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub version: ::prost::alloc::string::String,
    #[prost(int32, tag = "3")]
    pub tcp_port: i32,
    #[prost(message, repeated, tag = "4")]
    pub vulns: ::prost::alloc::vec::Vec<Vulnerability>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Vulnerability {
    #[prost(string, tag = "1")]
    pub identifier: ::prost::alloc::string::String,
    #[prost(float, tag = "2")]
    pub cvss_score: f32,
}

include!(concat!(env!("OUT_DIR"), "/netvuln.v1.NetVulnService.rs"));
