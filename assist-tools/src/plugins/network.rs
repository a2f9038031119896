//! HTTP requests, page text extraction, and file downloads.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use chrono::Local;
use hyper::body::HttpBody as _;
use hyper::client::HttpConnector;
use hyper::header::{
    CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
    LOCATION, USER_AGENT,
};
use hyper::{Body, Client, Method, Request, Response, StatusCode, Uri};
use hyper_rustls::HttpsConnector;
use regex::Regex;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use serde_json::{Map, Value, json};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use webpki_roots::TLS_SERVER_ROOTS;

use super::{Plugin, str_arg};
use crate::declare::ToolBuilder;
use crate::error::{PluginError, ToolResult};
use crate::registry::ToolRegistry;
use crate::validation::ParameterRule;

type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

const URL_PATTERN: &str = r"https?://[^\s/?#]+\S*";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) gem-assist";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_REDIRECTS: usize = 5;
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
const HIDDEN_TAGS: [&str; 6] = ["script", "style", "header", "footer", "nav", "noscript"];

static HIDDEN_BLOCKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    HIDDEN_TAGS
        .iter()
        .filter_map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).ok())
        .collect()
});
static COMMENTS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").ok());
static LINE_BREAKS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)<(br|/p|/div|/li|/h[1-6]|/tr|/section|/article)\b[^>]*>").ok()
});
static TAGS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());
static DISPOSITION_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"filename\*?=(?:UTF-8'')?["']?([^"';\s]+)"#).ok());

/// Web page, HTTP API, and download tools.
#[derive(Clone, Copy, Debug, Default)]
pub struct NetworkPlugin;

impl Plugin for NetworkPlugin {
    fn name(&self) -> &str {
        "network"
    }

    fn register(&self, registry: &mut ToolRegistry) -> ToolResult<()> {
        let client = https_client();

        ToolBuilder::new("get_website_text_content")
            .description("Fetch a web page and return its readable text.")
            .param("url", url_rule("Page URL"))
            .categories(["web", "content"])
            .requires_network()
            .rate_limited()
            .example("get_website_text_content(url=\"https://example.com\")")
            .register(registry, {
                let client = client.clone();
                move |args: Value| get_website_text_content(client.clone(), args)
            })?;

        ToolBuilder::new("http_get_request")
            .description("Make an HTTP GET request and return status, headers, and body.")
            .param("url", url_rule("URL to request"))
            .param(
                "headers",
                ParameterRule::object()
                    .optional()
                    .description("Extra request headers as name/value pairs"),
            )
            .categories(["web", "api"])
            .requires_network()
            .rate_limited()
            .register(registry, {
                let client = client.clone();
                move |args: Value| http_get_request(client.clone(), args)
            })?;

        ToolBuilder::new("http_post_request")
            .description("Make an HTTP POST request with a JSON or text body.")
            .param("url", url_rule("URL to request"))
            .param(
                "json_data",
                ParameterRule::new()
                    .optional()
                    .description("JSON body; sets Content-Type to application/json"),
            )
            .param(
                "body",
                ParameterRule::string()
                    .optional()
                    .description("Raw text body, used when json_data is absent"),
            )
            .param(
                "headers",
                ParameterRule::object()
                    .optional()
                    .description("Extra request headers as name/value pairs"),
            )
            .categories(["web", "api"])
            .requires_network()
            .rate_limited()
            .register(registry, {
                let client = client.clone();
                move |args: Value| http_post_request(client.clone(), args)
            })?;

        ToolBuilder::new("download_file_from_url")
            .description("Download a file. The name comes from the response when no path is given.")
            .param("url", url_rule("URL of the file"))
            .param(
                "output_path",
                ParameterRule::string()
                    .optional()
                    .description("Where to save the file (default: current directory)"),
            )
            .categories(["web", "download"])
            .requires_network()
            .requires_filesystem()
            .register(registry, move |args: Value| {
                download_file_from_url(client.clone(), args)
            })
    }
}

fn url_rule(description: &str) -> ParameterRule {
    ParameterRule::string()
        .regex(URL_PATTERN)
        .description(format!("{description} (http:// or https://)"))
}

fn https_client() -> HttpClient {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    Client::builder().build::<_, Body>(HttpsConnector::from((http, Arc::new(config))))
}

async fn get_website_text_content(client: HttpClient, args: Value) -> ToolResult<Value> {
    let url = str_arg(&args, "url")?;
    let exchange = async {
        let (mut response, final_url) =
            send(&client, Method::GET, url, None, &Map::new()).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PluginError::execution(format!(
                "fetching `{url}` returned {status}"
            )));
        }
        let (bytes, truncated) = read_limited(response.body_mut(), MAX_BODY_BYTES).await?;
        let text = html_to_text(&String::from_utf8_lossy(&bytes));
        Ok(json!({
            "url": final_url,
            "truncated": truncated,
            "content": text,
        }))
    };
    timeout(REQUEST_TIMEOUT, exchange)
        .await
        .map_err(|_| timed_out(url))?
}

async fn http_get_request(client: HttpClient, args: Value) -> ToolResult<Value> {
    let url = str_arg(&args, "url")?;
    let headers = header_args(&args);
    let exchange = async {
        let (response, final_url) = send(&client, Method::GET, url, None, &headers).await?;
        describe(response, final_url).await
    };
    timeout(REQUEST_TIMEOUT, exchange)
        .await
        .map_err(|_| timed_out(url))?
}

async fn http_post_request(client: HttpClient, args: Value) -> ToolResult<Value> {
    let url = str_arg(&args, "url")?;
    let headers = header_args(&args);
    let payload = match (args.get("json_data"), args.get("body").and_then(Value::as_str)) {
        (Some(data), _) if !data.is_null() => Some(Payload {
            bytes: serde_json::to_vec(data).map_err(|err| {
                PluginError::execution(format!("cannot encode json_data: {err}"))
            })?,
            content_type: "application/json",
        }),
        (_, Some(text)) => Some(Payload {
            bytes: text.as_bytes().to_vec(),
            content_type: "text/plain; charset=utf-8",
        }),
        _ => None,
    };

    let exchange = async {
        let (response, final_url) =
            send(&client, Method::POST, url, payload.as_ref(), &headers).await?;
        describe(response, final_url).await
    };
    timeout(REQUEST_TIMEOUT, exchange)
        .await
        .map_err(|_| timed_out(url))?
}

async fn download_file_from_url(client: HttpClient, args: Value) -> ToolResult<Value> {
    let url = str_arg(&args, "url")?;
    let output_path = args.get("output_path").and_then(Value::as_str);

    let exchange = async {
        let started = Instant::now();
        let (mut response, final_url) =
            send(&client, Method::GET, url, None, &Map::new()).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PluginError::execution(format!(
                "downloading `{url}` returned {status}"
            )));
        }

        let path = match output_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(resolve_filename(&final_url, response.headers())),
        };
        let fail = |err: std::io::Error| {
            PluginError::execution(format!("cannot write `{}`: {err}", path.display()))
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(fail)?;
        }

        let mut file = fs::File::create(&path).await.map_err(fail)?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.body_mut().data().await {
            let chunk = chunk.map_err(|err| {
                PluginError::execution(format!("download of `{url}` failed: {err}"))
            })?;
            file.write_all(&chunk).await.map_err(fail)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(fail)?;

        let secs = started.elapsed().as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let speed_kbps = if secs > 0.0 {
            (written as f64 / 1024.0) / secs
        } else {
            0.0
        };
        Ok(json!({
            "success": true,
            "url": final_url,
            "file_path": path.display().to_string(),
            "file_size": written,
            "download_time_seconds": (secs * 100.0).round() / 100.0,
            "speed_kbps": (speed_kbps * 100.0).round() / 100.0,
            "content_type": header_str(response.headers(), &CONTENT_TYPE).unwrap_or("unknown"),
        }))
    };
    timeout(DOWNLOAD_TIMEOUT, exchange)
        .await
        .map_err(|_| timed_out(url))?
}

struct Payload {
    bytes: Vec<u8>,
    content_type: &'static str,
}

/// Sends a request, following redirects. Returns the final response and URL.
async fn send(
    client: &HttpClient,
    method: Method,
    url: &str,
    payload: Option<&Payload>,
    headers: &Map<String, Value>,
) -> ToolResult<(Response<Body>, String)> {
    let mut uri = parse_uri(url)?;
    let mut method = method;
    let mut payload = payload;

    for _ in 0..=MAX_REDIRECTS {
        let request = build_request(&method, &uri, payload, headers)?;
        let response = client
            .request(request)
            .await
            .map_err(|err| PluginError::execution(format!("request to `{uri}` failed: {err}")))?;

        let status = response.status();
        let next = match header_str(response.headers(), &LOCATION) {
            Some(location) if status.is_redirection() => Some(resolve_location(&uri, location)?),
            _ => None,
        };
        let Some(next) = next else {
            return Ok((response, uri.to_string()));
        };

        uri = next;
        if matches!(
            status,
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
        ) && method == Method::POST
        {
            method = Method::GET;
            payload = None;
        }
    }

    Err(PluginError::execution(format!(
        "too many redirects starting from `{url}`"
    )))
}

fn build_request(
    method: &Method,
    uri: &Uri,
    payload: Option<&Payload>,
    headers: &Map<String, Value>,
) -> ToolResult<Request<Body>> {
    let body = payload.map_or_else(Body::empty, |p| Body::from(p.bytes.clone()));
    let mut request = Request::new(body);
    *request.method_mut() = method.clone();
    *request.uri_mut() = uri.clone();

    let map = request.headers_mut();
    map.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    if let Some(payload) = payload {
        map.insert(CONTENT_TYPE, HeaderValue::from_static(payload.content_type));
    }
    for (name, value) in headers {
        let value = value.as_str().map_or_else(|| value.to_string(), str::to_owned);
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| PluginError::execution(format!("invalid header name `{name}`: {err}")))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|err| PluginError::execution(format!("invalid value for `{name}`: {err}")))?;
        map.insert(name, value);
    }
    Ok(request)
}

async fn describe(mut response: Response<Body>, final_url: String) -> ToolResult<Value> {
    let status = response.status();
    let content_type = header_str(response.headers(), &CONTENT_TYPE)
        .unwrap_or("unknown")
        .to_owned();
    let headers: Map<String, Value> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                json!(String::from_utf8_lossy(value.as_bytes())),
            )
        })
        .collect();

    let mut result = json!({
        "status_code": status.as_u16(),
        "headers": headers,
        "content_type": content_type,
        "url": final_url,
    });

    let lowered = content_type.to_ascii_lowercase();
    let textual = ["text", "json", "xml"].iter().any(|kind| lowered.contains(kind));
    let (bytes, truncated) = read_limited(response.body_mut(), MAX_BODY_BYTES).await?;
    if textual {
        if lowered.contains("json") {
            if let Ok(parsed) = serde_json::from_slice::<Value>(&bytes) {
                result["json"] = parsed;
            }
        }
        result["text"] = json!(String::from_utf8_lossy(&bytes));
        result["truncated"] = json!(truncated);
    } else {
        let length = header_str(response.headers(), &CONTENT_LENGTH)
            .and_then(|len| len.parse::<u64>().ok())
            .unwrap_or(bytes.len() as u64);
        result["content_length"] = json!(length);
    }
    Ok(result)
}

async fn read_limited(body: &mut Body, limit: usize) -> ToolResult<(Vec<u8>, bool)> {
    let mut buf = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk =
            chunk.map_err(|err| PluginError::execution(format!("error reading body: {err}")))?;
        let room = limit - buf.len();
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok((buf, false))
}

fn header_args(args: &Value) -> Map<String, Value> {
    args.get("headers")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn parse_uri(url: &str) -> ToolResult<Uri> {
    url.trim()
        .parse::<Uri>()
        .map_err(|err| PluginError::execution(format!("invalid URL `{url}`: {err}")))
}

fn resolve_location(base: &Uri, location: &str) -> ToolResult<Uri> {
    let scheme = base.scheme_str().unwrap_or("https");
    let authority = base.authority().map_or("", |a| a.as_str());

    let resolved = if location.starts_with("http://") || location.starts_with("https://") {
        location.to_owned()
    } else if location.starts_with("//") {
        format!("{scheme}:{location}")
    } else if location.starts_with('/') {
        format!("{scheme}://{authority}{location}")
    } else {
        let path = base.path();
        let dir = &path[..path.rfind('/').map_or(0, |idx| idx + 1)];
        format!("{scheme}://{authority}{dir}{location}")
    };
    parse_uri(&resolved)
}

/// Name for a downloaded file: the `Content-Disposition` filename, the last
/// URL path segment, or a timestamped name with an extension for the type.
fn resolve_filename(url: &str, headers: &HeaderMap) -> String {
    let from_header = header_str(headers, &CONTENT_DISPOSITION)
        .and_then(|value| DISPOSITION_NAME.as_ref()?.captures(value))
        .and_then(|caps| caps.get(1))
        .and_then(|m| safe_file_name(m.as_str()));
    if let Some(name) = from_header {
        return name;
    }

    let path = url
        .parse::<Uri>()
        .map(|uri| uri.path().to_owned())
        .unwrap_or_default();
    if let Some(name) = safe_file_name(&path).filter(|name| name.contains('.')) {
        return name;
    }

    let content_type = header_str(headers, &CONTENT_TYPE)
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .unwrap_or_default();
    format!(
        "download_{}{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        extension_for(content_type)
    )
}

fn safe_file_name(candidate: &str) -> Option<String> {
    Path::new(candidate)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty() && name != "..")
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "text/plain" => ".txt",
        "text/html" => ".html",
        "text/css" => ".css",
        "text/javascript" => ".js",
        "application/pdf" => ".pdf",
        "application/json" => ".json",
        "application/xml" => ".xml",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "application/zip" => ".zip",
        _ => ".bin",
    }
}

/// Strips markup, hidden blocks, and blank lines from an HTML document.
fn html_to_text(html: &str) -> String {
    let mut text = html.to_owned();
    for block in HIDDEN_BLOCKS.iter() {
        text = block.replace_all(&text, "").into_owned();
    }
    if let Some(comments) = COMMENTS.as_ref() {
        text = comments.replace_all(&text, "").into_owned();
    }
    if let Some(breaks) = LINE_BREAKS.as_ref() {
        text = breaks.replace_all(&text, "\n").into_owned();
    }
    if let Some(tags) = TAGS.as_ref() {
        text = tags.replace_all(&text, "").into_owned();
    }

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn timed_out(url: &str) -> PluginError {
    PluginError::execution(format!("request to `{url}` timed out"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        NetworkPlugin.register(&mut registry).unwrap();
        registry
    }

    fn reply(status: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut text = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n",
            body.len()
        );
        for (name, value) in headers {
            text.push_str(&format!("{name}: {value}\r\n"));
        }
        text.push_str("\r\n");
        text.push_str(body);
        text
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    /// Answers one connection per canned reply and forwards each raw request.
    async fn serve(replies: Vec<String>) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            for reply in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                let _ = tx.send(request);
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        (base, rx)
    }

    #[test]
    fn tools_declare_network_capabilities() {
        let registry = registry();
        let get = registry.get_capabilities("http_get_request").unwrap();
        assert!(get.requires_network());
        assert!(get.rate_limited());

        let download = registry.get_capabilities("download_file_from_url").unwrap();
        assert!(download.requires_filesystem());
        assert!(!download.rate_limited());

        let mut limited = registry.rate_limited_tools();
        limited.sort_unstable();
        assert_eq!(
            limited,
            vec!["get_website_text_content", "http_get_request", "http_post_request"]
        );
    }

    #[tokio::test]
    async fn urls_need_an_http_scheme() {
        let registry = registry();
        for url in ["ftp://example.com/file", "example.com", " https://x.io"] {
            let err = registry
                .invoke("http_get_request", json!({ "url": url }))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PatternMismatch, "{url}");
        }
    }

    #[tokio::test]
    async fn get_returns_parsed_json_and_sends_headers() {
        let (base, mut requests) = serve(vec![reply(
            "200 OK",
            &[("Content-Type", "application/json")],
            r#"{"ok":true}"#,
        )])
        .await;

        let result = registry()
            .invoke(
                "http_get_request",
                json!({ "url": format!("{base}/data"), "headers": { "X-Trace": "7" } }),
            )
            .await
            .unwrap();
        assert_eq!(result["status_code"], 200);
        assert_eq!(result["json"]["ok"], true);
        assert_eq!(result["content_type"], "application/json");

        let request = requests.recv().await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("get /data "));
        assert!(request.contains("x-trace: 7"));
        assert!(request.contains("user-agent: mozilla"));
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let (base, mut requests) = serve(vec![reply(
            "201 Created",
            &[("Content-Type", "text/plain")],
            "made",
        )])
        .await;

        let result = registry()
            .invoke(
                "http_post_request",
                json!({ "url": format!("{base}/items"), "json_data": { "name": "gem" } }),
            )
            .await
            .unwrap();
        assert_eq!(result["status_code"], 201);
        assert_eq!(result["text"], "made");

        let request = requests.recv().await.unwrap();
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"name":"gem"}"#));
    }

    #[tokio::test]
    async fn redirects_are_followed() {
        let (base, mut requests) = serve(vec![
            reply("302 Found", &[("Location", "/final")], ""),
            reply("200 OK", &[("Content-Type", "text/html")], "<p>Landed</p>"),
        ])
        .await;

        let result = registry()
            .invoke(
                "get_website_text_content",
                json!({ "url": format!("{base}/start") }),
            )
            .await
            .unwrap();
        assert_eq!(result["content"], "Landed");
        assert!(result["url"].as_str().unwrap().ends_with("/final"));

        assert!(requests.recv().await.unwrap().starts_with("GET /start "));
        assert!(requests.recv().await.unwrap().starts_with("GET /final "));
    }

    #[tokio::test]
    async fn download_writes_the_body() {
        let (base, _requests) = serve(vec![reply(
            "200 OK",
            &[("Content-Type", "text/csv")],
            "a,b\n1,2\n",
        )])
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out/report.csv");

        let result = registry()
            .invoke(
                "download_file_from_url",
                json!({ "url": format!("{base}/r"), "output_path": target.to_str().unwrap() }),
            )
            .await
            .unwrap();
        assert_eq!(result["file_size"], 8);
        assert_eq!(result["content_type"], "text/csv");
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "a,b\n1,2\n");
    }

    #[tokio::test]
    async fn error_status_fails_page_fetch() {
        let (base, _requests) = serve(vec![reply("404 Not Found", &[], "gone")]).await;
        let err = registry()
            .invoke("get_website_text_content", json!({ "url": base }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn html_text_drops_scripts_and_markup() {
        let html = "<html><head><style>p{}</style><script>alert(1)</script></head>\
            <body><nav>Menu</nav><h1>Title</h1><p>Fish &amp; chips</p><!-- note -->\
            <div>Line<br>two</div></body></html>";
        assert_eq!(html_to_text(html), "Title\nFish & chips\nLine\ntwo");
    }

    #[test]
    fn filenames_come_from_headers_then_path() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"../report.pdf\""),
        );
        assert_eq!(resolve_filename("https://x.io/get", &headers), "report.pdf");

        let headers = HeaderMap::new();
        assert_eq!(
            resolve_filename("https://x.io/files/data.tar.gz?v=1", &headers),
            "data.tar.gz"
        );

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png; q=1"));
        let name = resolve_filename("https://x.io/render", &headers);
        assert!(name.starts_with("download_") && name.ends_with(".png"), "{name}");
    }

    #[test]
    fn relative_redirects_resolve_against_the_request() {
        let base: Uri = "http://x.io/a/b?q=1".parse().unwrap();
        assert_eq!(
            resolve_location(&base, "/root").unwrap().to_string(),
            "http://x.io/root"
        );
        assert_eq!(
            resolve_location(&base, "c").unwrap().to_string(),
            "http://x.io/a/c"
        );
        assert_eq!(
            resolve_location(&base, "//cdn.io/z").unwrap().to_string(),
            "http://cdn.io/z"
        );
    }
}
