//! Queued request model.

use crate::{OutboxError, OutboxResult};
use beacon_database::RequestRecord;
use chrono::{DateTime, Utc};

/// What gets sent: a full GET URL, or a POST body for the collector endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPayload {
    Get { url: String },
    Post { body: String },
}

impl RequestPayload {
    pub fn is_get(&self) -> bool {
        matches!(self, Self::Get { .. })
    }

    /// The URL for GET, the body for POST.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get { url } => url,
            Self::Post { body } => body,
        }
    }
}

/// One unit of outbound work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Assigned at enqueue time, strictly increasing.
    pub id: i64,
    pub payload: RequestPayload,
    pub created_at: DateTime<Utc>,
}

impl Request {
    pub fn is_get(&self) -> bool {
        self.payload.is_get()
    }

    pub fn to_record(&self) -> RequestRecord {
        let (url, body) = match &self.payload {
            RequestPayload::Get { url } => (Some(url.clone()), None),
            RequestPayload::Post { body } => (None, Some(body.clone())),
        };
        RequestRecord {
            id: self.id,
            is_get: self.is_get(),
            url,
            body,
            created_at: self.created_at,
        }
    }
}

impl TryFrom<RequestRecord> for Request {
    type Error = OutboxError;

    fn try_from(record: RequestRecord) -> OutboxResult<Self> {
        let payload = match (record.is_get, record.url, record.body) {
            (true, Some(url), _) => RequestPayload::Get { url },
            (false, _, Some(body)) => RequestPayload::Post { body },
            _ => return Err(OutboxError::InvalidRecord(record.id)),
        };
        Ok(Self {
            id: record.id,
            payload,
            created_at: record.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_conversion_keeps_verb() {
        let request = Request {
            id: 4,
            payload: RequestPayload::Post {
                body: r#"{"app_key":"k"}"#.to_string(),
            },
            created_at: Utc::now(),
        };
        let record = request.to_record();
        assert!(!record.is_get);
        assert!(record.url.is_none());
        assert_eq!(Request::try_from(record).unwrap(), request);
    }

    #[test]
    fn test_record_without_matching_field_is_invalid() {
        let record = RequestRecord {
            id: 9,
            is_get: true,
            url: None,
            body: Some("{}".to_string()),
            created_at: Utc::now(),
        };
        assert!(matches!(
            Request::try_from(record),
            Err(OutboxError::InvalidRecord(9))
        ));
    }
}
