use crate::address::{self, AddressKind};
use crate::srs;
use std::fmt;

pub const COMMAND_GET: &str = "get ";

/// A parsed `get <address>` request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub address: String,
}

impl Request {
    /// Parse a raw request line. Returns `None` for anything that is not a
    /// `get` command.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let rest = line.strip_prefix(COMMAND_GET)?;
        Some(Request {
            address: rest.trim().to_string(),
        })
    }
}

/// The single line written back on every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Resolved(String),
    InvalidRequest,
    ReadError,
}

impl Response {
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Resolved(_))
    }

    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Resolved(address) => write!(f, "200 {address}"),
            Response::InvalidRequest => write!(f, "500 invalid request"),
            Response::ReadError => write!(f, "500 read error"),
        }
    }
}

/// Turns request lines into responses. Holds no per-request state and is
/// shared by every connection handler.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    fallback: Option<String>,
}

impl Resolver {
    pub fn new(fallback: Option<String>) -> Self {
        let fallback = fallback.filter(|f| !f.trim().is_empty());
        Resolver { fallback }
    }

    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    pub fn respond(&self, line: &str) -> Response {
        match Request::parse(line) {
            Some(request) => self.resolve(&request.address),
            None => {
                log::debug!("Rejected request line: {:?}", line.trim());
                Response::InvalidRequest
            }
        }
    }

    pub fn resolve(&self, address: &str) -> Response {
        match address::classify(address) {
            AddressKind::CleanEmail => {
                log::debug!("Clean address {address}, nothing to resolve");
                Response::Resolved(address.to_string())
            }
            kind if kind.is_srs() => match srs::decode(address) {
                Ok(decoded) => {
                    log::info!("Resolved {address} -> {decoded}");
                    Response::Resolved(decoded)
                }
                Err(e) => self.fall_back(address, &e.to_string()),
            },
            _ => self.fall_back(address, "unrecognized address"),
        }
    }

    fn fall_back(&self, address: &str, reason: &str) -> Response {
        match &self.fallback {
            Some(fallback) => {
                log::error!("Invalid address {address} ({reason}), returning fallback {fallback}");
                Response::Resolved(fallback.clone())
            }
            None => {
                log::error!("Invalid address {address} ({reason}), no fallback configured");
                Response::InvalidRequest
            }
        }
    }
}
