//! Login page markup.

use crate::handshake::{HandshakeState, MessageKind, RenderInstruction};
use std::fmt::Write;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Bridge login</title>
<link rel="stylesheet" href="/login.css">
</head>
<body>
<main class="login">
<h1>Log in to the bridge</h1>
"#;

const PAGE_TAIL: &str = "</main>\n</body>\n</html>\n";

/// Escape text for HTML element and attribute content.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[must_use]
pub fn login_page(instruction: &RenderInstruction) -> String {
    let mut page = String::from(PAGE_HEAD);
    let identity = escape(instruction.identity.as_deref().unwrap_or_default());

    if let Some(message) = &instruction.message {
        let class = match message.kind {
            MessageKind::Error => "error",
            MessageKind::Info => "info",
        };
        let _ = writeln!(
            page,
            r#"<p class="message {class}">{}</p>"#,
            escape(&message.text)
        );
    }

    let state = instruction.state.as_str();
    match instruction.state {
        HandshakeState::LoggedIn => {
            let who = instruction
                .username
                .as_deref()
                .map_or_else(String::new, |username| format!(" as @{}", escape(username)));
            let _ = writeln!(
                page,
                r#"<p class="state {state}">Logged in{who}. You can close this page.</p>"#
            );
        }
        _ => {
            let _ = writeln!(
                page,
                r#"<form class="state {state}" method="post" action="/login">"#
            );
            let _ = writeln!(
                page,
                r#"<label>Matrix ID <input type="text" name="identity" value="{identity}" required></label>"#
            );
            let field = match instruction.state {
                HandshakeState::AwaitingCode => {
                    r#"<label>Code <input type="text" name="code" inputmode="numeric" autocomplete="one-time-code"></label>"#
                }
                HandshakeState::AwaitingPassword => {
                    r#"<label>Password <input type="password" name="password" autocomplete="current-password"></label>"#
                }
                _ => r#"<label>Phone number <input type="tel" name="phone" placeholder="+15550100"></label>"#,
            };
            let _ = writeln!(page, "{field}");
            let _ = writeln!(page, r#"<button type="submit">Continue</button>"#);
            let _ = writeln!(page, "</form>");
        }
    }

    page.push_str(PAGE_TAIL);
    page
}
