use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};

use anyhow::{anyhow, bail};
use oauth2::url::Url;
use oauth2::{AuthorizationCode, CsrfToken};
use tracing::debug;

const DONE_PAGE: &str = "<html><body>
<p>The authentication flow has completed. You may close this window.</p>
<script type=\"text/javascript\">window.close();</script>
</body></html>";

/// A very small redirect server: waits on `listener` for the browser to come back with
/// `?code=...&state=...`. Requests without a code (favicon and the like) are answered
/// with a 404 and otherwise ignored.
pub fn wait_for_redirect(
    listener: TcpListener,
    expected_state: &CsrfToken,
) -> anyhow::Result<AuthorizationCode> {
    for stream in listener.incoming() {
        let mut stream = stream?;

        let url = {
            let mut reader = BufReader::new(&stream);
            let mut request_line = String::new();
            reader.read_line(&mut request_line)?;

            match request_line.split_whitespace().nth(1) {
                Some(target) => Url::parse(&format!("http://localhost{target}"))?,
                None => continue,
            }
        };

        let param = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        };

        if let Some(error) = param("error") {
            respond(&mut stream, "400 Bad Request", "Authorization was not granted.")?;
            bail!("authorization was denied: {error}");
        }

        let Some(code) = param("code") else {
            debug!(path = url.path(), "ignoring request without a code");
            respond(&mut stream, "404 Not Found", "")?;
            continue;
        };

        let state = param("state").ok_or_else(|| anyhow!("redirect did not include a state"))?;
        if state != *expected_state.secret() {
            respond(&mut stream, "400 Bad Request", "State mismatch.")?;
            bail!("redirect state did not match the authorization request");
        }

        respond(&mut stream, "200 OK", DONE_PAGE)?;
        return Ok(AuthorizationCode::new(code));
    }

    bail!("redirect listener closed before an authorization code arrived")
}

fn respond(stream: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\ncontent-type: text/html; charset=utf-8\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes())?;
    stream.flush()
}
