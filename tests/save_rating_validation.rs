use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

struct Server {
    child: Child,
    _stdout: BufReader<ChildStdout>,
    base_url: String,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_server(data_dir: &Path) -> Server {
    let exe = env!("CARGO_BIN_EXE_rateboardd");
    let mut child = Command::new(exe)
        .env("RATEBOARD_PORT", "0")
        .env("RATEBOARD_DATA_DIR", data_dir)
        .env("RUST_LOG", "info")
        .env("NO_COLOR", "1")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rateboardd");
    let stdout = child.stdout.take().expect("child stdout");
    let mut reader = BufReader::new(stdout);

    let mut line = String::new();
    let port = loop {
        line.clear();
        let n = reader.read_line(&mut line).expect("read startup line");
        assert!(n > 0, "daemon exited before reporting its address");
        if let Some(rest) = line.split("Server running on").nth(1) {
            let digits: String = rest
                .rsplit(':')
                .next()
                .unwrap_or("")
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            break digits.parse::<u16>().expect("parse bound port");
        }
    };

    Server {
        child,
        _stdout: reader,
        base_url: format!("http://127.0.0.1:{port}"),
    }
}

fn save_rating(
    server: &Server,
    body: serde_json::Value,
    cookie: Option<&str>,
) -> (u16, serde_json::Value, Option<String>) {
    let client = reqwest::blocking::Client::new();
    let mut request = client
        .post(format!("{}/api/save-rating", server.base_url))
        .json(&body);
    if let Some(cookie) = cookie {
        request = request.header("Cookie", format!("userId={cookie}"));
    }
    let response = request.send().expect("save-rating request");
    let status = response.status().as_u16();
    let issued = response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| {
            let rest = v.strip_prefix("userId=")?;
            rest.split(';').next().map(|s| s.trim().to_string())
        });
    let body: serde_json::Value = response.json().expect("save-rating response json");
    (status, body, issued)
}

fn get_ratings(server: &Server) -> serde_json::Value {
    let response = reqwest::blocking::get(format!("{}/api/get-ratings", server.base_url))
        .expect("get-ratings request");
    assert_eq!(response.status().as_u16(), 200);
    response.json().expect("get-ratings response json")
}

#[test]
fn out_of_range_and_malformed_submissions_are_rejected() {
    let workspace = temp_dir("rateboard-validation");
    let server = spawn_server(&workspace);

    let rejected = [
        json!({ "teacherIndex": 0, "rating": 0 }),
        json!({ "teacherIndex": 0, "rating": 11 }),
        json!({ "teacherIndex": 0, "rating": 5.5 }),
        json!({ "teacherIndex": 0, "rating": "8" }),
        json!({ "teacherIndex": 0 }),
        json!({ "rating": 5 }),
        json!({ "teacherIndex": "0", "rating": 5 }),
        json!({ "teacherIndex": 99, "rating": 5 }),
        json!({ "teacherIndex": -1, "rating": 5 }),
    ];
    for body in rejected {
        let (status, response, _) = save_rating(&server, body.clone(), None);
        assert_eq!(status, 400, "payload {body} must be rejected");
        assert_eq!(
            response.get("error").and_then(|v| v.as_str()),
            Some("Invalid input"),
            "payload {body}"
        );
    }

    // Rejected submissions leave no state behind.
    assert_eq!(get_ratings(&server), json!({}));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn first_contact_gets_a_cookie_even_when_validation_fails() {
    let workspace = temp_dir("rateboard-validation-cookie");
    let server = spawn_server(&workspace);

    // The identity token is assigned before the amount checks run, so a
    // failed first attempt still consumes the first-contact assignment.
    let (status, _, issued) =
        save_rating(&server, json!({ "teacherIndex": 0, "rating": 99 }), None);
    assert_eq!(status, 400);
    let user_id = issued.expect("rejected first contact still gets a userId cookie");

    // A request that already carries the cookie is not re-issued one.
    let (status, _, issued) = save_rating(
        &server,
        json!({ "teacherIndex": 0, "rating": 99 }),
        Some(&user_id),
    );
    assert_eq!(status, 400);
    assert!(issued.is_none());

    // The issued identity works for a valid submission afterwards.
    let (status, body, _) = save_rating(
        &server,
        json!({ "teacherIndex": 0, "rating": 8 }),
        Some(&user_id),
    );
    assert_eq!(status, 200);
    assert_eq!(body.get("success").and_then(|v| v.as_bool()), Some(true));

    let _ = std::fs::remove_dir_all(workspace);
}
