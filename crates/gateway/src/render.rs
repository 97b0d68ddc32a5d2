//! Chat rendering of approval requests and their keyboards.
//!
//! `markdown` requests are rendered as Telegram MarkdownV2, `html` requests as
//! the Telegram HTML subset. All caller-supplied text is escaped for the
//! chosen dialect.

use std::fmt::Write as _;

use proto::{ApprovalRequest, Button, Keyboard, Markup, MessageId};

use crate::action::Action;
use crate::i18n::Messages;

/// MarkdownV2 characters that must be escaped outside code spans.
const MARKDOWN_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// Renders the notification text for a request.
pub fn render_request(req: &ApprovalRequest, msg: &Messages) -> String {
    match req.markup {
        Markup::Markdown => render_markdown(req, msg),
        Markup::Html => render_html(req, msg),
    }
}

fn render_markdown(req: &ApprovalRequest, msg: &Messages) -> String {
    let mut out = String::new();
    let _ = write!(out, "*{}*\n\n", escape_markdown(&msg.approval_title));
    let _ = writeln!(
        out,
        "{}: `{}`",
        escape_markdown(&msg.approval_correlation),
        escape_markdown_code(&req.correlation_id)
    );
    let _ = writeln!(
        out,
        "{}: `{}`",
        escape_markdown(&msg.approval_tool),
        escape_markdown_code(&req.tool)
    );

    for (label, body) in text_sections(req, msg) {
        let _ = write!(
            out,
            "\n*{}*\n{}\n",
            escape_markdown(label),
            escape_markdown(body.trim())
        );
    }

    let _ = write!(
        out,
        "\n*{}*\n```json\n{}\n```",
        escape_markdown(&msg.approval_params),
        escape_markdown_code(&pretty_arguments(req))
    );

    if !req.links_to_code.is_empty() {
        let _ = write!(out, "\n\n*{}*", escape_markdown(&msg.approval_links));
        for link in &req.links_to_code {
            let _ = write!(
                out,
                "\n• [{}]({})",
                escape_markdown(link.text.trim()),
                escape_markdown_url(link.url.trim())
            );
        }
    }
    out
}

fn render_html(req: &ApprovalRequest, msg: &Messages) -> String {
    let mut out = String::new();
    let _ = write!(out, "<b>{}</b>\n\n", escape_html(&msg.approval_title));
    let _ = writeln!(
        out,
        "{}: <code>{}</code>",
        escape_html(&msg.approval_correlation),
        escape_html(&req.correlation_id)
    );
    let _ = writeln!(
        out,
        "{}: <code>{}</code>",
        escape_html(&msg.approval_tool),
        escape_html(&req.tool)
    );

    for (label, body) in text_sections(req, msg) {
        let _ = write!(
            out,
            "\n<b>{}</b>\n{}\n",
            escape_html(label),
            escape_html(body.trim())
        );
    }

    let _ = write!(
        out,
        "\n<b>{}</b>\n<pre><code class=\"language-json\">{}</code></pre>",
        escape_html(&msg.approval_params),
        escape_html(&pretty_arguments(req))
    );

    if !req.links_to_code.is_empty() {
        let _ = write!(out, "\n\n<b>{}</b>", escape_html(&msg.approval_links));
        for link in &req.links_to_code {
            let _ = write!(
                out,
                "\n• <a href=\"{}\">{}</a>",
                escape_html(link.url.trim()),
                escape_html(link.text.trim())
            );
        }
    }
    out
}

/// Optional free-text sections in display order, skipping blanks.
fn text_sections<'a>(req: &'a ApprovalRequest, msg: &'a Messages) -> Vec<(&'a str, &'a str)> {
    [
        (msg.approval_action.as_str(), req.approval_request.as_str()),
        (
            msg.approval_justification.as_str(),
            req.justification.as_str(),
        ),
        (msg.approval_risk.as_str(), req.risk_assessment.as_str()),
    ]
    .into_iter()
    .filter(|(_, body)| !body.trim().is_empty())
    .collect()
}

fn pretty_arguments(req: &ApprovalRequest) -> String {
    serde_json::to_string_pretty(&req.arguments).unwrap_or_else(|_| "{}".to_string())
}

/// Approve / Deny / Deny-with-message controls.
pub fn decision_keyboard(msg: &Messages, correlation_id: &str) -> Keyboard {
    Keyboard::new(vec![
        vec![
            Button::new(
                &msg.approve_button,
                Action::Approve.callback_data(correlation_id),
            ),
            Button::new(&msg.deny_button, Action::Deny.callback_data(correlation_id)),
        ],
        vec![Button::new(
            &msg.deny_with_message_button,
            Action::DenyWithMessage.callback_data(correlation_id),
        )],
    ])
}

/// Cancel control shown under the deny-reason prompt.
pub fn prompt_keyboard(msg: &Messages, correlation_id: &str) -> Keyboard {
    Keyboard::new(vec![vec![Button::new(
        &msg.cancel_deny_button,
        Action::CancelDeny.callback_data(correlation_id),
    )]])
}

/// Single delete control left on a resolved message.
pub fn resolved_keyboard(msg: &Messages, message_id: MessageId) -> Keyboard {
    Keyboard::new(vec![vec![Button::new(
        &msg.delete_button,
        Action::Delete.callback_data(&message_id.to_string()),
    )]])
}

/// Escapes free text for the given dialect.
pub fn escape(text: &str, markup: Markup) -> String {
    match markup {
        Markup::Markdown => escape_markdown(text),
        Markup::Html => escape_html(text),
    }
}

/// Escapes text outside MarkdownV2 code spans.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escapes text inside MarkdownV2 `code` and ```pre``` blocks.
pub fn escape_markdown_code(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '`' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escapes the URL part of a MarkdownV2 inline link.
fn escape_markdown_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for c in url.chars() {
        if c == ')' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escapes text for the Telegram HTML subset.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
