//! Project sheet loading: HTTP transport, CSV parsing and the refresh cache.

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use polars::prelude::*;

use crate::cache::FetchCache;
use crate::clock::Clock;
use crate::error::{FetchError, PipelineError};
use crate::schema::project;

const USER_AGENT: &str = concat!("housing-pipeline/", env!("CARGO_PKG_VERSION"));

/// Outbound GET of a text document.
pub trait Transport {
    fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        (**self).get_text(url)
    }
}

/// Blocking HTTP transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self::from_client(client))
    }

    /// Wrap a preconfigured client.
    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let http_err = |e: reqwest::Error| FetchError::Http {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().map_err(http_err)
    }
}

/// A fetched project sheet, every column as String.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub frame: DataFrame,
    pub fetched_at: DateTime<Utc>,
}

/// Source adapter: fetches the sheet through `T`, serving repeats from cache.
pub struct ProjectSource<T, C> {
    transport: T,
    cache: FetchCache<Sheet, C>,
}

impl<T: Transport, C: Clock> ProjectSource<T, C> {
    pub fn new(transport: T, cache: FetchCache<Sheet, C>) -> Self {
        Self { transport, cache }
    }

    /// Load the sheet at `url`. Only successful fetches are cached.
    pub fn load(&mut self, url: &str) -> Result<Sheet, PipelineError> {
        if let Some(sheet) = self.cache.get(url) {
            tracing::debug!(url = %url, fetched_at = %sheet.fetched_at, "Project sheet served from cache");
            return Ok(sheet);
        }

        tracing::info!(url = %url, "Fetching project sheet");
        let body = self.transport.get_text(url).inspect_err(|e| {
            tracing::warn!(url = %url, error = %e, "Project sheet fetch failed");
        })?;

        let frame = read_projects_csv(body.into_bytes()).inspect_err(|e| {
            tracing::warn!(url = %url, error = %e, "Project sheet is not usable tabular data");
        })?;

        tracing::info!(url = %url, rows = frame.height(), "Fetched project sheet");
        let sheet = Sheet {
            frame,
            fetched_at: Utc::now(),
        };
        self.cache.insert(url.to_string(), sheet.clone());
        Ok(sheet)
    }

    /// Drop every cached sheet so the next load hits the network.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }
}

/// Parse CSV text into the all-String project frame.
///
/// Any parse failure or a header missing a required column is reported as
/// `FetchError::Malformed`.
pub fn read_projects_csv(bytes: Vec<u8>) -> Result<DataFrame, PipelineError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| FetchError::Malformed(e.to_string()))?;
    let df = trim_column_names(df).map_err(|e| FetchError::Malformed(e.to_string()))?;

    require_sheet_columns(&df)?;
    Ok(df)
}

/// Read a local CSV snapshot of the sheet.
pub fn load_projects_file(path: impl AsRef<Path>) -> Result<DataFrame, PipelineError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no such file: {}", path.display()),
        )
        .into());
    }
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .map_err(|e| FetchError::Malformed(e.to_string()))?;
    let df = trim_column_names(df)?;

    require_sheet_columns(&df)?;
    tracing::info!(path = %path.display(), rows = df.height(), "Loaded project snapshot");
    Ok(df)
}

fn trim_column_names(mut df: DataFrame) -> PolarsResult<DataFrame> {
    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;
    Ok(df)
}

fn require_sheet_columns(df: &DataFrame) -> Result<(), FetchError> {
    let missing: Vec<&str> = project::REQUIRED
        .iter()
        .copied()
        .filter(|name| df.column(name).is_err())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(FetchError::Malformed(format!(
            "missing columns: {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::cell::{Cell, RefCell};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    pub(crate) const SHEET: &str = "\
Project,Property address,Status,Occupancy,Market Rate Rentals,Affordable Rentals,Market Rate Owner,Affordable Owner,Total units,Latitude,Longitude,Market rate,City project info,Media,Notes
Harbor Place,1 Harbor St,Approved,2024,10,5,0,0,15,43.07,-70.76,Yes,https://city.example/harbor,,Near the river
Elm Court,22 Elm Ave,Under construction,2026,0,0,4,2,6,,,,,,
Lafayette Lofts,300 Lafayette Rd,Proposed,TBD,20,,,,20,43.05,-70.78,Yes,,https://news.example/lofts,
";

    /// Transport returning canned responses and counting calls.
    pub(crate) struct FakeTransport {
        pub(crate) calls: Cell<usize>,
        pub(crate) response: RefCell<Result<String, u16>>,
    }

    impl FakeTransport {
        pub(crate) fn ok(body: &str) -> Self {
            Self {
                calls: Cell::new(0),
                response: RefCell::new(Ok(body.to_string())),
            }
        }
    }

    impl Transport for FakeTransport {
        fn get_text(&self, url: &str) -> Result<String, FetchError> {
            self.calls.set(self.calls.get() + 1);
            match &*self.response.borrow() {
                Ok(body) => Ok(body.clone()),
                Err(status) => Err(FetchError::Status {
                    url: url.to_string(),
                    status: *status,
                }),
            }
        }
    }

    fn source<'a>(
        transport: &'a FakeTransport,
        clock: &'a ManualClock,
    ) -> ProjectSource<&'a FakeTransport, &'a ManualClock> {
        ProjectSource::new(
            transport,
            FetchCache::new(Duration::from_secs(120), 4, clock),
        )
    }

    /// Serve one canned HTTP response on a loopback port; returns its URL.
    fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).unwrap();
        });
        format!("http://{addr}/export")
    }

    fn loopback_transport() -> HttpTransport {
        let client = reqwest::blocking::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpTransport::from_client(client)
    }

    #[test]
    fn http_transport_returns_body_on_success() {
        let url = serve_once(format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            SHEET.len(),
            SHEET
        ));
        let body = loopback_transport().get_text(&url).unwrap();
        assert_eq!(body, SHEET);
        assert_eq!(read_projects_csv(body.into_bytes()).unwrap().height(), 3);
    }

    #[test]
    fn http_transport_maps_error_status() {
        let url = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_string(),
        );
        let err = loopback_transport().get_text(&url).unwrap_err();
        match err {
            FetchError::Status { url: failed, status } => {
                assert_eq!(status, 503);
                assert_eq!(failed, url);
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn http_transport_maps_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{addr}/export");
        let err = loopback_transport().get_text(&url).unwrap_err();
        assert!(
            matches!(&err, FetchError::Http { url: failed, .. } if *failed == url),
            "{err:?}"
        );
    }

    #[test]
    fn http_transport_builds_with_timeout() {
        assert!(HttpTransport::new(Duration::from_secs(1)).is_ok());
        let message = FetchError::Client("tls backend unavailable".into()).to_string();
        assert!(message.starts_with("HTTP client could not be built"));
    }

    #[test]
    fn parses_sheet_as_strings() {
        let df = read_projects_csv(SHEET.as_bytes().to_vec()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(
            df.column(project::TOTAL_UNITS).unwrap().dtype(),
            &DataType::String
        );
    }

    #[test]
    fn header_whitespace_is_trimmed() {
        let csv = " Project ,Occupancy,Market Rate Rentals,Affordable Rentals,Market Rate Owner,Affordable Owner, Total units\nA,2025,1,1,0,0,2\n";
        let df = read_projects_csv(csv.as_bytes().to_vec()).unwrap();
        assert!(df.column(project::NAME).is_ok());
        assert!(df.column(project::TOTAL_UNITS).is_ok());
    }

    #[test]
    fn non_tabular_body_is_malformed() {
        let err = read_projects_csv(b"<html><body>Sign in</body></html>".to_vec()).unwrap_err();
        assert!(matches!(err, PipelineError::Fetch(FetchError::Malformed(_))));
    }

    #[test]
    fn second_load_within_window_is_served_from_cache() {
        let transport = FakeTransport::ok(SHEET);
        let clock = ManualClock::new();
        let mut source = source(&transport, &clock);

        let first = source.load("http://sheet").unwrap();
        clock.advance(Duration::from_secs(60));
        let second = source.load("http://sheet").unwrap();

        assert_eq!(transport.calls.get(), 1);
        assert_eq!(first.fetched_at, second.fetched_at);
        assert!(first.frame.equals_missing(&second.frame));
    }

    #[test]
    fn expired_entry_is_refetched() {
        let transport = FakeTransport::ok(SHEET);
        let clock = ManualClock::new();
        let mut source = source(&transport, &clock);

        source.load("http://sheet").unwrap();
        clock.advance(Duration::from_secs(121));
        source.load("http://sheet").unwrap();
        assert_eq!(transport.calls.get(), 2);
    }

    #[test]
    fn invalidate_forces_refetch() {
        let transport = FakeTransport::ok(SHEET);
        let clock = ManualClock::new();
        let mut source = source(&transport, &clock);

        source.load("http://sheet").unwrap();
        source.invalidate();
        source.load("http://sheet").unwrap();
        assert_eq!(transport.calls.get(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let transport = FakeTransport::ok(SHEET);
        *transport.response.borrow_mut() = Err(503);
        let clock = ManualClock::new();
        let mut source = source(&transport, &clock);

        let err = source.load("http://sheet").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Fetch(FetchError::Status { status: 503, .. })
        ));

        *transport.response.borrow_mut() = Ok(SHEET.to_string());
        source.load("http://sheet").unwrap();
        assert_eq!(transport.calls.get(), 2);
    }

    #[test]
    fn local_snapshot_loads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SHEET.as_bytes()).unwrap();
        let df = load_projects_file(file.path()).unwrap();
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn missing_snapshot_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_projects_file(dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
