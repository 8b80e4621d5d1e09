//! Runtime settings derived from the validated configuration.
//!
//! `Settings` is built once per server and shared by every request through
//! an `Arc`; nothing in it changes after construction.

use crate::config::schema::DispatchConfig;

#[derive(Debug, Clone)]
pub struct Limits {
    pub max_request_body_size: usize,
    pub max_upload_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_request_body_size: 16 * 1024,
            max_upload_size: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreamSettings {
    pub max_send_retries: Option<u32>,
}

/// Headers appended to every response, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeaders {
    headers: Vec<(String, String)>,
}

impl DefaultHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub limits: Limits,
    pub stream: StreamSettings,
    pub default_headers: DefaultHeaders,
}

impl Settings {
    pub fn from_config(config: &DispatchConfig) -> Self {
        let mut default_headers = DefaultHeaders::new();
        for header in &config.default_headers {
            default_headers.add(&header.name, &header.value);
        }

        Self {
            limits: Limits {
                max_request_body_size: config.limits.max_request_body_size,
                max_upload_size: config.limits.max_upload_size,
            },
            stream: StreamSettings {
                max_send_retries: config.stream.max_send_retries,
            },
            default_headers,
        }
    }
}
