//! Downloads every URL of a URL-list file into a directory.

use std::{
    fs::{self, File},
    io::{BufRead, BufReader, Write},
    path::Path,
};

use anyhow::{anyhow, Context, Error, Result};
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reqwest::{header::LOCATION, redirect::Policy, Client, ClientBuilder, Response, Url};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{cli::create_progress_bar, config::Credentials};

/// Host of the Earthdata login that GES DISC redirects to.
pub const EARTHDATA_LOGIN_HOST: &str = "urs.earthdata.nasa.gov";
const MAX_REDIRECTS: usize = 10;

/// How many files a URL list produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub downloaded: usize,
    pub skipped: usize,
}

/// Client builder that keeps session cookies and stops in front of
/// `login_host`, so the login request can be re-sent with credentials.
///
/// reqwest drops `Authorization` on cross-host redirects, hence the stop.
pub fn client_builder(login_host: &str) -> ClientBuilder {
    let login_host = login_host.to_string();
    let policy = Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if attempt.url().host_str() == Some(login_host.as_str()) {
            attempt.stop()
        } else {
            attempt.follow()
        }
    });

    Client::builder().cookie_store(true).redirect(policy)
}

/// Reads one URL per line, skipping blank lines and `#` comments.
pub fn read_url_list(url_list: &Path) -> Result<Vec<String>> {
    let file = File::open(url_list)
        .with_context(|| format!("Failed to open URL list `{}`", url_list.display()))?;

    let mut urls = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        urls.push(line.to_string());
    }

    Ok(urls)
}

/// Name of the file a URL is saved as.
///
/// GES DISC subsetting URLs all share the `HTTP_services.cgi` path, so their
/// `LABEL` parameter wins, then the base name of `FILENAME`, then the last
/// path segment.
pub fn url_file_name(url: &str) -> Result<String> {
    let parsed = Url::parse(url).with_context(|| format!("Malformed URL `{}`", url))?;

    let query_value = |name: &str| {
        parsed
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    if let Some(label) = query_value("LABEL").filter(|label| !label.is_empty()) {
        return Ok(label);
    }
    if let Some(file_name) = query_value("FILENAME")
        .and_then(|path| path.rsplit('/').next().map(str::to_string))
        .filter(|name| !name.is_empty())
    {
        return Ok(file_name);
    }

    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Cannot derive a file name from `{}`", url))
}

/// Downloads every URL listed in `url_list` into `save_dir`, one at a time.
///
/// Files that already exist with content are left alone. The first failure
/// aborts the remaining downloads.
pub async fn fetch_url_list(
    client: &Client,
    url_list: &Path,
    save_dir: &Path,
    credentials: Option<&Credentials>,
) -> Result<FetchSummary> {
    let urls = read_url_list(url_list)?;
    fs::create_dir_all(save_dir)
        .with_context(|| format!("Failed to create `{}`", save_dir.display()))?;
    info!(url_list = %url_list.display(), count = urls.len(), "fetching URL list");

    let bars = MultiProgress::new();
    let overall = bars.add(create_progress_bar(urls.len() as u64, "Downloading files...".to_string()));
    let mut summary = FetchSummary::default();

    for url in &urls {
        let file_path = save_dir.join(url_file_name(url)?);

        if is_downloaded(&file_path) {
            debug!(file = %file_path.display(), "already downloaded");
            summary.skipped += 1;
            overall.inc(1);
            continue;
        }

        let file_bar = bars.add(ProgressBar::new_spinner().with_message(file_name_of(&file_path)));
        download_with_progress(client, url, &file_path, credentials, &file_bar).await?;
        file_bar.finish_and_clear();
        bars.remove(&file_bar);

        summary.downloaded += 1;
        overall.inc(1);
    }
    overall.finish_with_message("Files downloaded");

    Ok(summary)
}

/// Streams `url` to `file_path`, showing bytes received on `progress_bar`.
///
/// The body is written to a temporary file next to the target and only moved
/// into place once complete, so an interrupted run leaves no partial file.
pub async fn download_with_progress(
    client: &Client,
    url: &str,
    file_path: &Path,
    credentials: Option<&Credentials>,
    progress_bar: &ProgressBar,
) -> Result<u64, Error> {
    let response = send_with_login(client, url, credentials).await?;

    if !response.status().is_success() {
        return Err(Error::msg(format!(
            "Failed to download `{}`: {}",
            url,
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    if total_size > 0 {
        progress_bar.set_length(total_size);
        progress_bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}")?
                .progress_chars("=> "),
        );
    }

    let dir = file_path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| Error::msg(format!("Error reading chunk: {}", e)))?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        progress_bar.set_position(downloaded);
    }

    file.flush()?;
    file.persist(file_path)
        .with_context(|| format!("Failed to save `{}`", file_path.display()))?;

    Ok(downloaded)
}

/// Sends a GET, re-sending it with basic auth whenever the client stopped at
/// a redirect into the login host.
async fn send_with_login(client: &Client, url: &str, credentials: Option<&Credentials>) -> Result<Response> {
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::msg(format!("Failed to download `{}`: {}", url, e)))?;

    for _ in 0..MAX_REDIRECTS {
        let Some(login_url) = redirect_location(&response) else {
            break;
        };
        let credentials = credentials.ok_or_else(|| {
            anyhow!(
                "`{}` redirects to a login at `{}`, set EARTHDATA_USERNAME and EARTHDATA_PASSWORD",
                url,
                login_url.host_str().unwrap_or_default()
            )
        })?;
        debug!(%login_url, "sending Earthdata credentials");

        response = client
            .get(login_url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await
            .map_err(|e| Error::msg(format!("Failed to log in for `{}`: {}", url, e)))?;
    }

    Ok(response)
}

fn redirect_location(response: &Response) -> Option<Url> {
    if !response.status().is_redirection() {
        return None;
    }
    let location = response.headers().get(LOCATION)?.to_str().ok()?;

    response.url().join(location).ok()
}

fn is_downloaded(file_path: &Path) -> bool {
    fs::metadata(file_path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

fn file_name_of(file_path: &Path) -> String {
    file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use std::{net::SocketAddr, sync::Arc};

    use tempfile::TempDir;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    const GES_DISC_URL: &str = "https://hydro1.gesdisc.eosdis.nasa.gov/daac-bin/OTF/HTTP_services.cgi?FILENAME=%2Fdata%2FNLDAS%2FNLDAS_FORA0125_H.002%2F2014%2F001%2FNLDAS_FORA0125_H.A20140101.0000.002.grb&FORMAT=bmM0Lw&BBOX=25%2C-125%2C53%2C-67&LABEL=NLDAS_FORA0125_H.A20140101.0000.002.grb.SUB.nc4&SHORTNAME=NLDAS_FORA0125_H&SERVICE=L34RS_LDAS&VERSION=1.02&DATASET_VERSION=002";
    const LOGIN_HOST: &str = "login.test";

    pub(crate) async fn local_listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        (listener, addr)
    }

    /// Answers every connection with `handler(request head)`, then closes it.
    pub(crate) fn serve<F>(listener: TcpListener, handler: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let handler = handler.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }
                    let reply = handler(&String::from_utf8_lossy(&head));
                    let _ = socket.write_all(reply.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
    }

    pub(crate) fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut reply = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            status,
            body.len()
        );
        for (name, value) in headers {
            reply.push_str(&format!("{}: {}\r\n", name, value));
        }
        reply.push_str("\r\n");
        reply.push_str(body);

        reply
    }

    /// Path and query of the request line.
    pub(crate) fn request_target(request: &str) -> &str {
        request.split_whitespace().nth(1).unwrap_or_default()
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "hydro".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn should_name_file_after_label() {
        assert_eq!(
            url_file_name(GES_DISC_URL).unwrap(),
            "NLDAS_FORA0125_H.A20140101.0000.002.grb.SUB.nc4"
        );
    }

    #[test]
    fn should_name_file_after_filename_parameter() {
        let first = "https://hydro1.gesdisc.eosdis.nasa.gov/daac-bin/OTF/HTTP_services.cgi?FILENAME=%2Fdata%2FNLDAS%2FNLDAS_FORA0125_H.002%2F2014%2F001%2FNLDAS_FORA0125_H.A20140101.0000.002.grb&FORMAT=bmM0Lw";
        let second = "https://hydro1.gesdisc.eosdis.nasa.gov/daac-bin/OTF/HTTP_services.cgi?FILENAME=%2Fdata%2FNLDAS%2FNLDAS_FORA0125_H.002%2F2014%2F001%2FNLDAS_FORA0125_H.A20140101.0100.002.grb&FORMAT=bmM0Lw";

        assert_eq!(
            url_file_name(first).unwrap(),
            "NLDAS_FORA0125_H.A20140101.0000.002.grb"
        );
        assert_eq!(
            url_file_name(second).unwrap(),
            "NLDAS_FORA0125_H.A20140101.0100.002.grb"
        );
    }

    #[test]
    fn should_name_file_after_last_path_segment() {
        let url = "https://hydro1.gesdisc.eosdis.nasa.gov/data/NLDAS/NLDAS_FORA0125_H.002/2014/001/NLDAS_FORA0125_H.A20140101.0000.002.grb?version=2";

        assert_eq!(
            url_file_name(url).unwrap(),
            "NLDAS_FORA0125_H.A20140101.0000.002.grb"
        );
    }

    #[test]
    fn should_reject_url_without_file_name() {
        assert!(url_file_name("https://example.org/").is_err());
        assert!(url_file_name("not a url").is_err());
    }

    #[test]
    fn should_read_url_list_skipping_blanks() {
        let tmp_dir = TempDir::new().unwrap();
        let list = tmp_dir.path().join("subset_NLDAS_FORA0125_H_002.txt");
        fs::write(
            &list,
            format!("{}\n\n  \n# comment\nhttps://example.org/a.nc4\n", GES_DISC_URL),
        )
        .unwrap();

        let urls = read_url_list(&list).unwrap();

        assert_eq!(urls, vec![GES_DISC_URL.to_string(), "https://example.org/a.nc4".to_string()]);
    }

    #[tokio::test]
    async fn should_skip_files_already_downloaded() {
        let tmp_dir = TempDir::new().unwrap();
        let list = tmp_dir.path().join("NLDAS_2014.txt");
        let save_dir = tmp_dir.path().join("nldas_hourly").join("2014");
        fs::write(&list, "https://example.invalid/data/a.nc4\n").unwrap();
        fs::create_dir_all(&save_dir).unwrap();
        fs::write(save_dir.join("a.nc4"), b"done").unwrap();

        let summary = fetch_url_list(&Client::new(), &list, &save_dir, None)
            .await
            .unwrap();

        assert_eq!(summary, FetchSummary { downloaded: 0, skipped: 1 });
    }

    #[tokio::test]
    async fn should_fail_on_missing_url_list_without_creating_save_dir() {
        let tmp_dir = TempDir::new().unwrap();
        let list = tmp_dir.path().join("NLDAS_missing.txt");
        let save_dir = tmp_dir.path().join("nldas_hourly").join("2014");

        let result = fetch_url_list(&Client::new(), &list, &save_dir, None).await;

        assert!(result.is_err());
        assert!(!save_dir.exists());
    }

    #[tokio::test]
    async fn should_stream_body_to_file() {
        let (listener, addr) = local_listener().await;
        serve(listener, |_| http_response("200 OK", &[], "NLDAS forcing bytes"));
        let tmp_dir = TempDir::new().unwrap();
        let file_path = tmp_dir.path().join("a.nc4");

        let size = download_with_progress(
            &Client::new(),
            &format!("http://{}/data/a.nc4", addr),
            &file_path,
            None,
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        assert_eq!(size, 19);
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "NLDAS forcing bytes");
    }

    #[tokio::test]
    async fn should_fail_on_error_status_without_partial_file() {
        let (listener, addr) = local_listener().await;
        serve(listener, |_| http_response("404 Not Found", &[], "missing"));
        let tmp_dir = TempDir::new().unwrap();
        let file_path = tmp_dir.path().join("a.nc4");

        let err = download_with_progress(
            &Client::new(),
            &format!("http://{}/data/a.nc4", addr),
            &file_path,
            None,
            &ProgressBar::hidden(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("404"));
        assert!(!file_path.exists());
        assert_eq!(fs::read_dir(tmp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn should_download_every_listed_url() {
        let (listener, addr) = local_listener().await;
        serve(listener, |request| {
            let target = request_target(request).to_string();
            http_response("200 OK", &[], &format!("body of {}", target))
        });
        let tmp_dir = TempDir::new().unwrap();
        let list = tmp_dir.path().join("NLDAS_2014.txt");
        let save_dir = tmp_dir.path().join("nldas_hourly").join("2014");
        fs::write(&list, format!("http://{0}/data/a.nc4\nhttp://{0}/data/b.nc4\n", addr)).unwrap();

        let summary = fetch_url_list(&Client::new(), &list, &save_dir, None)
            .await
            .unwrap();

        assert_eq!(summary, FetchSummary { downloaded: 2, skipped: 0 });
        assert_eq!(fs::read_to_string(save_dir.join("b.nc4")).unwrap(), "body of /data/b.nc4");
    }

    #[tokio::test]
    async fn should_send_credentials_to_login_host_only() {
        let (data_listener, data_addr) = local_listener().await;
        let (login_listener, login_addr) = local_listener().await;

        serve(data_listener, move |request| {
            if request.lines().any(|l| l.to_ascii_lowercase().starts_with("authorization:")) {
                return http_response("400 Bad Request", &[], "credentials leaked");
            }
            if request_target(request).contains("code=granted") {
                http_response("200 OK", &[], "NLDAS forcing bytes")
            } else {
                let login = format!("http://{}:{}/oauth/authorize", LOGIN_HOST, login_addr.port());
                http_response("302 Found", &[("Location", login.as_str())], "")
            }
        });
        serve(login_listener, move |request| {
            let authorized = request
                .lines()
                .any(|l| l.eq_ignore_ascii_case("authorization: Basic aHlkcm86c2VjcmV0"));
            if authorized {
                let back = format!("http://{}/data/a.nc4?code=granted", data_addr);
                http_response("302 Found", &[("Location", back.as_str())], "")
            } else {
                http_response("401 Unauthorized", &[], "")
            }
        });

        let client = client_builder(LOGIN_HOST)
            .resolve(LOGIN_HOST, login_addr)
            .build()
            .unwrap();
        let tmp_dir = TempDir::new().unwrap();
        let file_path = tmp_dir.path().join("a.nc4");

        download_with_progress(
            &client,
            &format!("http://{}/data/a.nc4", data_addr),
            &file_path,
            Some(&credentials()),
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "NLDAS forcing bytes");
    }

    #[tokio::test]
    async fn should_ask_for_credentials_on_login_redirect() {
        let (listener, addr) = local_listener().await;
        serve(listener, |_| {
            let login = format!("https://{}/oauth/authorize", LOGIN_HOST);
            http_response("302 Found", &[("Location", login.as_str())], "")
        });
        let client = client_builder(LOGIN_HOST).build().unwrap();
        let tmp_dir = TempDir::new().unwrap();

        let err = download_with_progress(
            &client,
            &format!("http://{}/data/a.nc4", addr),
            &tmp_dir.path().join("a.nc4"),
            None,
            &ProgressBar::hidden(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("EARTHDATA_USERNAME"));
    }
}
