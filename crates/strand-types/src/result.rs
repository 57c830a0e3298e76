use serde::{Deserialize, Serialize};

/// Outcome stored for a link token: either the computed value or the
/// message of the failure that prevented computing it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeResult<T> {
    Data(T),
    Error(String),
}

impl<T> NodeResult<T> {
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Data(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Data(_) => None,
            Self::Error(message) => Some(message),
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Data(value) => Some(value),
            Self::Error(_) => None,
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for NodeResult<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Data(value),
            Err(e) => Self::Error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let ok: NodeResult<u32> = NodeResult::Data(4);
        let err: NodeResult<u32> = NodeResult::Error("boom".into());
        assert_eq!(ok.data(), Some(&4));
        assert!(ok.error().is_none());
        assert_eq!(err.error(), Some("boom"));
        assert!(err.is_error());
    }

    #[test]
    fn from_result_keeps_message() {
        let result: Result<u32, std::fmt::Error> = Err(std::fmt::Error);
        let stored: NodeResult<u32> = result.into();
        assert_eq!(stored.error(), Some("an error occurred when formatting an argument"));
    }
}
