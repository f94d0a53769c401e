//! Server-rendered pages

use crate::types::{LeaderboardEntry, TeamHistory};
use std::fmt::Write;

const STYLE: &str = r#"
        body {
            font-family: Arial, sans-serif;
            max-width: 900px;
            margin: 40px auto;
            padding: 20px;
            background: #f5f5f5;
        }
        .container {
            background: white;
            padding: 30px;
            border-radius: 8px;
            box-shadow: 0 2px 4px rgba(0,0,0,0.1);
        }
        h1 {
            color: #333;
            border-bottom: 3px solid #4CAF50;
            padding-bottom: 10px;
        }
        table { border-collapse: collapse; width: 100%; margin-bottom: 24px; }
        th, td { text-align: left; padding: 6px 10px; border-bottom: 1px solid #ddd; }
        .error { color: #b00020; font-weight: bold; }
"#;

/// Escape text for inclusion in HTML content or attribute values.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n    <title>{title}</title>\n    <style>{STYLE}</style>\n</head>\n<body>\n    <div class=\"container\">\n{body}    </div>\n</body>\n</html>\n",
        title = escape(title),
    )
}

pub fn render_leaderboard(entries: &[LeaderboardEntry], history: &[TeamHistory]) -> String {
    let mut body = String::new();
    body.push_str("        <h1>Leaderboard</h1>\n");
    body.push_str("        <p><a href=\"/submit\">Make a submission</a></p>\n");

    if entries.is_empty() {
        body.push_str("        <p>No submissions yet.</p>\n");
    } else {
        body.push_str(
            "        <table>\n            <tr><th>#</th><th>Team</th><th>Best score</th><th>Submissions</th></tr>\n",
        );
        for entry in entries {
            let _ = writeln!(
                body,
                "            <tr><td>{}</td><td>{}</td><td>{:.5}</td><td>{}</td></tr>",
                entry.rank,
                escape(&entry.team_name),
                entry.best_score,
                entry.submissions
            );
        }
        body.push_str("        </table>\n");
    }

    body.push_str("        <h2>Submissions by team</h2>\n");
    for team_history in history {
        let _ = writeln!(body, "        <h3>{}</h3>", escape(&team_history.team.name));
        if team_history.submissions.is_empty() {
            body.push_str("        <p>No submissions.</p>\n");
            continue;
        }
        body.push_str(
            "        <table>\n            <tr><th>Number</th><th>Score</th><th>Submitted</th></tr>\n",
        );
        for submission in &team_history.submissions {
            let _ = writeln!(
                body,
                "            <tr><td>{}</td><td>{:.5}</td><td>{}</td></tr>",
                submission.number,
                submission.score,
                submission.submitted_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        body.push_str("        </table>\n");
    }

    page("Hackathon Leaderboard", &body)
}

pub fn render_submit_form(error: Option<&str>, team_key: &str) -> String {
    let mut body = String::new();
    body.push_str("        <h1>Make a submission</h1>\n");
    if let Some(error) = error {
        let _ = writeln!(body, "        <p class=\"error\">{}</p>", escape(error));
    }
    let _ = write!(
        body,
        r#"        <form method="post" action="/submit" enctype="multipart/form-data">
            <p><label>Team key <input type="text" name="team_key" value="{}" required></label></p>
            <p><label>Predictions (CSV) <input type="file" name="submission" accept=".csv" required></label></p>
            <p><button type="submit">Submit</button></p>
        </form>
        <p><a href="/">Back to leaderboard</a></p>
"#,
        escape(team_key)
    );
    page("Submit predictions", &body)
}
