extern crate anyhow;
extern crate image;
extern crate reqwest;
extern crate rppal;
extern crate serde_json;
extern crate std;

pub type DashResult<T> = std::result::Result<T, DashError>;

#[derive(Debug)]
pub enum DashError {
    // Fetch path. None of these ever leave the render loop.
    NetworkUnavailable(String),
    FetchTimeout,
    HttpStatus(u16),
    SnapshotTooLarge(usize),
    MalformedSnapshot(String),
    NoFallbackAvailable(String),

    GpioError(rppal::gpio::Error),
    ImageError(image::ImageError),
    IoError(std::io::Error),
    Other(anyhow::Error),
}

pub fn make_error(msg: &str) -> DashError {
    return DashError::Other(anyhow::anyhow!(msg.to_string()));
}

impl DashError {
    /// True for failures that the render loop absorbs by keeping
    /// whatever it showed before.
    pub fn is_fetch_failure(&self) -> bool {
        match *self {
            DashError::NetworkUnavailable(_) |
            DashError::FetchTimeout |
            DashError::HttpStatus(_) |
            DashError::SnapshotTooLarge(_) |
            DashError::MalformedSnapshot(_) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DashError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            DashError::NetworkUnavailable(ref msg) => {
                return write!(f, "Network unavailable: {}", msg);
            },
            DashError::FetchTimeout => {
                return write!(f, "Fetch timed out");
            },
            DashError::HttpStatus(status) => {
                return write!(f, "HTTP status {}", status);
            },
            DashError::SnapshotTooLarge(size) => {
                return write!(f, "Snapshot too large: {} bytes", size);
            },
            DashError::MalformedSnapshot(ref msg) => {
                return write!(f, "Malformed snapshot: {}", msg);
            },
            DashError::NoFallbackAvailable(ref msg) => {
                return write!(f, "No fallback available: {}", msg);
            },
            DashError::GpioError(ref err) => {
                return write!(f, "GPIO Error: {}", err);
            },
            DashError::ImageError(ref err) => {
                return write!(f, "Image Error: {}", err);
            },
            DashError::IoError(ref err) => {
                return write!(f, "IO Error: {}", err);
            },
            DashError::Other(ref err) => {
                return write!(f, "{:#}", err);
            },
        }
    }
}

impl std::error::Error for DashError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            DashError::GpioError(ref err) => Some(err),
            DashError::ImageError(ref err) => Some(err),
            DashError::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DashError {
    fn from(err: reqwest::Error) -> DashError {
        if err.is_timeout() {
            return DashError::FetchTimeout;
        }
        if let Some(status) = err.status() {
            return DashError::HttpStatus(status.as_u16());
        }
        if err.is_decode() || err.is_body() {
            return DashError::MalformedSnapshot(err.to_string());
        }
        return DashError::NetworkUnavailable(err.to_string());
    }
}

impl From<serde_json::Error> for DashError {
    fn from(err: serde_json::Error) -> DashError {
        return DashError::MalformedSnapshot(err.to_string());
    }
}

impl From<rppal::gpio::Error> for DashError {
    fn from(err: rppal::gpio::Error) -> DashError {
        return DashError::GpioError(err);
    }
}

impl From<image::ImageError> for DashError {
    fn from(err: image::ImageError) -> DashError {
        return DashError::ImageError(err);
    }
}

impl From<std::io::Error> for DashError {
    fn from(err: std::io::Error) -> DashError {
        if err.kind() == std::io::ErrorKind::TimedOut {
            return DashError::FetchTimeout;
        }
        return DashError::IoError(err);
    }
}

impl From<anyhow::Error> for DashError {
    fn from(err: anyhow::Error) -> DashError {
        return DashError::Other(err);
    }
}

#[cfg(test)]
mod tests {
    use super::DashError;

    #[test]
    fn fetch_failures_are_absorbed() {
        assert!(DashError::FetchTimeout.is_fetch_failure());
        assert!(DashError::HttpStatus(503).is_fetch_failure());
        assert!(DashError::MalformedSnapshot("x".to_string()).is_fetch_failure());
        assert!(!DashError::NoFallbackAvailable("x".to_string()).is_fetch_failure());
        assert!(!super::make_error("boom").is_fetch_failure());
    }

    #[test]
    fn io_timeout_maps_to_fetch_timeout() {
        let err: DashError = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow").into();
        match err {
            DashError::FetchTimeout => {},
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn json_errors_are_malformed_snapshots() {
        let err: DashError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(err.to_string().starts_with("Malformed snapshot"));
    }
}
