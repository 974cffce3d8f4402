use nanoem::common::NanoemError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainType {
    OS,
    Nanoem,
    Application,
    Cancel,
}

#[derive(Debug)]
pub struct EmappError {
    reason: String,
    recovery_suggestion: String,
    code: i32,
    domain: DomainType,
}

impl std::fmt::Display for EmappError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let recovery_hint = if self.recovery_suggestion.is_empty() {
            "".to_owned()
        } else {
            format!("(Try \"{}\" to recover)", self.recovery_suggestion)
        };
        write!(
            f,
            "[{:?} - {}]{}{}",
            self.domain, self.code, self.reason, recovery_hint
        )
    }
}

impl std::error::Error for EmappError {}

impl EmappError {
    pub fn new(reason: &str, recovery_suggestion: &str, domain: DomainType) -> Self {
        Self {
            reason: reason.to_owned(),
            recovery_suggestion: recovery_suggestion.to_owned(),
            code: 0,
            domain,
        }
    }

    pub fn from_nanoem(message: &str, status: NanoemError) -> Self {
        Self {
            reason: format!("{}: {}", message, status),
            recovery_suggestion: "".to_owned(),
            code: 0,
            domain: DomainType::Nanoem,
        }
    }

    pub fn invalid_redo_file_error() -> Self {
        Self {
            reason: "The redo file is not a valid redo log".to_owned(),
            recovery_suggestion: "Discard the redo file".to_owned(),
            code: 1,
            domain: DomainType::Application,
        }
    }

    pub fn corrupted_redo_record_error(sequence: u32) -> Self {
        Self {
            reason: format!("The redo record #{} is corrupted", sequence),
            recovery_suggestion: "Discard the redo file".to_owned(),
            code: 2,
            domain: DomainType::Application,
        }
    }

    pub fn redo_channel_closed_error() -> Self {
        Self {
            reason: "The command stream was closed during the redo replay".to_owned(),
            recovery_suggestion: "Try Restart or Report to us".to_owned(),
            code: 3,
            domain: DomainType::Application,
        }
    }

    pub fn canceled() -> Self {
        Self {
            reason: "Canceled".to_owned(),
            recovery_suggestion: "".to_owned(),
            code: 0,
            domain: DomainType::Cancel,
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn recovery_suggestion(&self) -> &str {
        &self.recovery_suggestion
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn domain(&self) -> DomainType {
        self.domain
    }

    pub fn is_canceled(&self) -> bool {
        self.domain == DomainType::Cancel
    }
}

impl From<std::io::Error> for EmappError {
    fn from(err: std::io::Error) -> Self {
        Self {
            reason: err.to_string(),
            recovery_suggestion: "".to_owned(),
            code: err.raw_os_error().unwrap_or_default(),
            domain: DomainType::OS,
        }
    }
}

impl From<NanoemError> for EmappError {
    fn from(err: NanoemError) -> Self {
        Self::from_nanoem("nanoem failed", err)
    }
}

#[test]
fn test_display_with_recovery_suggestion() {
    let err = EmappError::invalid_redo_file_error();
    assert_eq!(
        "[Application - 1]The redo file is not a valid redo log(Try \"Discard the redo file\" to recover)",
        err.to_string()
    );
    assert_eq!("[Cancel - 0]Canceled", EmappError::canceled().to_string());
}

#[test]
fn test_from_io_error_is_os_domain() {
    let err = EmappError::from(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "no redo file",
    ));
    assert_eq!(DomainType::OS, err.domain());
    assert_eq!("no redo file", err.reason());
}
