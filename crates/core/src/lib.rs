#![forbid(unsafe_code)]

pub mod model;
pub mod sync;

pub use model::{AcceptanceCriterion, LocalTask, RemoteIssue, Side};

pub mod ids {
    use serde::{Deserialize, Serialize};

    /// Identifier of a task in the local file-based tracker (e.g. `task-12`).
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(try_from = "String", into = "String")]
    pub struct TaskId(String);

    impl TaskId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn into_string(self) -> String {
            self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
            let value = value.into();
            let trimmed = value.trim();
            validate_task_id(trimmed)?;
            Ok(Self(trimmed.to_string()))
        }
    }

    /// Key of an issue in the remote tracker (e.g. `OPS-421`).
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(try_from = "String", into = "String")]
    pub struct IssueKey(String);

    impl IssueKey {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn into_string(self) -> String {
            self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
            let value = value.into();
            let normalized = value.trim().to_ascii_uppercase();
            let Some((project, number)) = normalized.rsplit_once('-') else {
                return Err(IdError::InvalidIssueKey);
            };
            validate_project_key(project).map_err(|_| IdError::InvalidIssueKey)?;
            if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
                return Err(IdError::InvalidIssueKey);
            }
            Ok(Self(normalized))
        }

        pub fn project(&self) -> &str {
            self.0.rsplit_once('-').map(|(p, _)| p).unwrap_or(&self.0)
        }
    }

    /// Project namespace in the remote tracker (the `OPS` in `OPS-421`).
    #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(try_from = "String", into = "String")]
    pub struct ProjectKey(String);

    impl ProjectKey {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
            let value = value.into();
            let normalized = value.trim().to_ascii_uppercase();
            validate_project_key(&normalized)?;
            Ok(Self(normalized))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
    pub enum IdError {
        #[error("task id must not be empty")]
        EmptyTaskId,
        #[error("task id is too long")]
        TaskIdTooLong,
        #[error("task id contains invalid character {ch:?} at {index}")]
        InvalidTaskIdChar { ch: char, index: usize },
        #[error("project key must not be empty")]
        EmptyProjectKey,
        #[error("project key must match [A-Z][A-Z0-9_]*")]
        InvalidProjectKey,
        #[error("issue key must match <PROJECT>-<number>")]
        InvalidIssueKey,
    }

    fn validate_task_id(value: &str) -> Result<(), IdError> {
        if value.is_empty() {
            return Err(IdError::EmptyTaskId);
        }
        if value.len() > 128 {
            return Err(IdError::TaskIdTooLong);
        }
        for (index, ch) in value.chars().enumerate() {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                continue;
            }
            return Err(IdError::InvalidTaskIdChar { ch, index });
        }
        Ok(())
    }

    fn validate_project_key(value: &str) -> Result<(), IdError> {
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(IdError::EmptyProjectKey);
        };
        if !first.is_ascii_uppercase() {
            return Err(IdError::InvalidProjectKey);
        }
        if !chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
            return Err(IdError::InvalidProjectKey);
        }
        Ok(())
    }

    macro_rules! string_conversions {
        ($ty:ident) => {
            impl TryFrom<String> for $ty {
                type Error = IdError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    Self::try_new(value)
                }
            }

            impl From<$ty> for String {
                fn from(value: $ty) -> Self {
                    value.0
                }
            }

            impl std::fmt::Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }
        };
    }

    string_conversions!(TaskId);
    string_conversions!(IssueKey);
    string_conversions!(ProjectKey);

}
