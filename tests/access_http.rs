use std::{
    io::{BufRead, BufReader, Read, Write},
    net::TcpListener,
    thread::JoinHandle,
};

use scrollreel::{AccessApi, HttpAccessApi, InviteGenerator, LoginForm, ReelError};

/// Answers one POST with `status` and `body`, handing back the request body it received.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':')
                && name.eq_ignore_ascii_case("content-length")
            {
                content_length = value.trim().parse().unwrap();
            }
        }
        let mut request = vec![0u8; content_length];
        reader.read_exact(&mut request).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        stream.flush().unwrap();
        String::from_utf8(request).unwrap()
    });
    (url, handle)
}

fn sent_json(handle: JoinHandle<String>) -> serde_json::Value {
    serde_json::from_str(&handle.join().unwrap()).unwrap()
}

#[test]
fn login_posts_code_and_parses_user() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"success":true,"data":{"user_name":"Ada","details":"early backer","access_code":"DROAME-ADA"}}"#,
    );
    let api = HttpAccessApi::new(url).unwrap();
    let resp = api.login("DROAME-ADA").unwrap();
    assert!(resp.success);
    let user = resp.data.unwrap();
    assert_eq!(user.user_name, "Ada");
    assert_eq!(user.details, serde_json::json!("early backer"));
    assert_eq!(
        sent_json(server),
        serde_json::json!({"action": "login", "code": "DROAME-ADA"})
    );
}

#[test]
fn refusal_in_error_status_is_still_an_answer() {
    let (url, server) = serve_once("401 Unauthorized", r#"{"success":false}"#);
    let api = HttpAccessApi::new(url).unwrap();
    let mut form = LoginForm::new();
    form.set_code("bad");
    assert!(form.submit(&api).is_none());
    assert_eq!(form.error(), Some("Invalid Access Code"));
    assert_eq!(sent_json(server)["code"], "BAD");
}

#[test]
fn malformed_body_is_an_access_error() {
    let (url, server) = serve_once("200 OK", "<html>gateway timeout</html>");
    let api = HttpAccessApi::new(url).unwrap();
    let err = api.login("X").unwrap_err();
    assert!(matches!(err, ReelError::Access(_)), "{err}");
    server.join().unwrap();
}

#[test]
fn unreachable_endpoint_shows_connection_failed() {
    let url = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let api = HttpAccessApi::new(url).unwrap();
    let mut form = LoginForm::new();
    form.set_code("x");
    assert!(form.submit(&api).is_none());
    assert_eq!(form.error(), Some("Connection failed"));
    assert!(!form.is_pending());
}

#[test]
fn generate_posts_invite_fields() {
    let (url, server) = serve_once("200 OK", r#"{"success":true,"new_code":"DROAME-7Q2X"}"#);
    let api = HttpAccessApi::new(url).unwrap();
    let mut invites = InviteGenerator::new();
    invites.open();
    invites.set_name("Ratan");
    invites.set_details("Met at Tech Summit");
    invites.submit(&api, "DROAME-ADA");
    assert_eq!(invites.generated_code(), Some("DROAME-7Q2X"));
    assert_eq!(
        sent_json(server),
        serde_json::json!({
            "action": "generate",
            "creator_code": "DROAME-ADA",
            "new_name": "Ratan",
            "new_details": "Met at Tech Summit"
        })
    );
}

#[test]
fn generate_surfaces_server_error_text() {
    let (url, server) = serve_once("403 Forbidden", r#"{"success":false,"error":"Not authorized"}"#);
    let api = HttpAccessApi::new(url).unwrap();
    let resp = api.generate("NOPE", "x", "").unwrap();
    assert!(!resp.success);
    assert_eq!(resp.error.as_deref(), Some("Not authorized"));
    server.join().unwrap();
}
