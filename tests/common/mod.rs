//! Shared helpers for integration tests
//!
//! `ScriptedTransport` replays canned responses in order and records every
//! request, so tests can assert exactly which calls reached the network.

#![allow(dead_code)]

use siga_client::{
    ApiGateway, ClientConfig, HttpRequest, HttpResponse, RequestCredentials, Result, SigaError,
    Transport,
};
use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const BASE_URL: &str = "https://siga.example.com/siga";

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<HttpResponse>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON response
    pub fn respond(&self, status: u16, body: serde_json::Value) -> &Self {
        self.responses.lock().unwrap().push_back(HttpResponse {
            status,
            body: serde_json::to_vec(&body).unwrap(),
        });
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// `METHOD path` of every request sent so far
    pub fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| {
                let url = reqwest::Url::parse(&r.url).unwrap();
                format!("{} {}", r.method, url.path())
            })
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses.lock().unwrap().pop_front().ok_or_else(|| {
            SigaError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                format!("no scripted response for {} {}", request.method, request.url),
            ))
        })
    }
}

pub fn test_config() -> ClientConfig {
    let credentials = RequestCredentials::new(
        "a7fd7728-a3ea-4975-bfab-f240a67e894f",
        "demo",
        "746573745365637265744b6579303031",
        BASE_URL,
    )
    .unwrap();
    ClientConfig::new(credentials)
}

pub fn gateway() -> (ApiGateway, ScriptedTransport) {
    let transport = ScriptedTransport::new();
    let gateway = ApiGateway::with_transport(&test_config(), Box::new(transport.clone())).unwrap();
    (gateway, transport)
}

/// Hashcode container as the service would return it after signing
pub fn signed_hashcode_container() -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file("mimetype", stored).unwrap();
    writer.write_all(b"application/vnd.etsi.asic-e+zip").unwrap();
    writer.start_file("META-INF/manifest.xml", stored).unwrap();
    writer.write_all(b"<manifest:manifest/>").unwrap();
    writer.start_file("META-INF/hashcodes-sha256.xml", stored).unwrap();
    writer.write_all(b"<hashcodes/>").unwrap();
    writer.start_file("META-INF/signatures0.xml", stored).unwrap();
    writer.write_all(b"<asic:XAdESSignatures/>").unwrap();
    writer.finish().unwrap().into_inner()
}
