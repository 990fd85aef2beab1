//! HTTP access to the panels' draw servers.

use std::time::Duration;

use image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pack::pack_4bit;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("panel task failed: {0}")]
    Task(String),
}

/// What a panel reports about itself on `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub width: u32,
    pub height: u32,
    pub temperature: i32,
    pub screen_model: String,
}

/// Flags accompanying a `POST /draw`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushOptions {
    /// Blank the panel before drawing.
    pub clear: bool,
    /// The body already carries the panel's mounting rotation.
    pub rotated: bool,
}

/// Panel I/O seam. The blocking HTTP implementation is the production one;
/// tests substitute their own.
pub trait Transport: Sync {
    fn query(&self, device_id: &str) -> Result<DeviceInfo, TransportError>;
    fn push(
        &self,
        device_id: &str,
        image: &GrayImage,
        opts: &PushOptions,
    ) -> Result<(), TransportError>;
    fn clear(&self, device_id: &str) -> Result<(), TransportError>;
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn query(&self, device_id: &str) -> Result<DeviceInfo, TransportError> {
        let info = self
            .client
            .get(format!("http://{device_id}/"))
            .send()?
            .error_for_status()?
            .json()?;
        Ok(info)
    }

    fn push(
        &self,
        device_id: &str,
        image: &GrayImage,
        opts: &PushOptions,
    ) -> Result<(), TransportError> {
        let body = pack_4bit(image);
        debug!(
            "pushing {}x{} image ({} bytes) to {device_id}",
            image.width(),
            image.height(),
            body.len()
        );
        self.client
            .post(format!("http://{device_id}/draw"))
            .header("width", image.width().to_string())
            .header("height", image.height().to_string())
            .header("x", "0")
            .header("y", "0")
            .header("clear", flag(opts.clear))
            .header("rotated", flag(opts.rotated))
            .body(body)
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn clear(&self, device_id: &str) -> Result<(), TransportError> {
        self.client
            .post(format!("http://{device_id}/clear"))
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}
