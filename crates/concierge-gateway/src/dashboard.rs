//! Server-rendered dashboard and login pages.
//!
//! Plain HTML assembled with `format!`: metric tiles, the 7-day lead bars,
//! the status histogram and one table per collection. No client-side
//! framework; the page is behind the login gate and reloads on demand.

use concierge_core::DashboardView;

const TILE_STYLE: &str = "padding:16px;border-radius:8px;background:#10243e;color:#e2e8f0;text-align:center;";
const ACCENT: &str = "#38bdf8";

pub fn render_login(error: Option<&str>) -> String {
    let banner = match error {
        Some(msg) => format!(
            r#"<div style="padding:10px;border-radius:6px;background:#7f1d1d;color:#fecaca;margin-bottom:12px;">{}</div>"#,
            html_escape(msg)
        ),
        None => String::new(),
    };
    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Concierge login</title></head>
<body style="font-family:system-ui,sans-serif;background:#0b1220;color:#e2e8f0;display:flex;justify-content:center;padding-top:10vh;">
<form method="post" action="/login" style="background:#10243e;padding:32px;border-radius:10px;min-width:320px;">
<h2 style="margin-top:0;">Dashboard login</h2>
{banner}
<label style="display:block;margin-bottom:4px;">Username</label>
<input name="username" style="width:100%;padding:8px;margin-bottom:12px;border-radius:6px;border:none;" autofocus>
<label style="display:block;margin-bottom:4px;">Password</label>
<input name="password" type="password" style="width:100%;padding:8px;margin-bottom:16px;border-radius:6px;border:none;">
<button type="submit" style="width:100%;padding:10px;border:none;border-radius:6px;background:{ACCENT};color:#0b1220;font-weight:600;">Sign in</button>
</form>
</body></html>"#
    )
}

pub fn render_dashboard(view: &DashboardView) -> String {
    let banner = match &view.error_message {
        Some(msg) => format!(
            r#"<div style="padding:12px;border-radius:6px;background:#7f1d1d;color:#fecaca;margin-bottom:16px;">{}</div>"#,
            html_escape(msg)
        ),
        None => String::new(),
    };

    let m = &view.metrics;
    let tiles = format!(
        r#"<div style="display:grid;grid-template-columns:repeat(6,1fr);gap:12px;margin-bottom:24px;">
{}{}{}{}{}{}</div>"#,
        tile("Total Leads", m.total_leads),
        tile("Leads Today", m.leads_today),
        tile("Appointments", m.total_appointments),
        tile("Upcoming", m.upcoming_appointments),
        tile("Conversations", m.total_conversations),
        tile("Unique Users", m.total_users),
    );

    let max_leads = view.leads_chart.values.iter().copied().max().unwrap_or(0);
    let mut lead_bars = String::new();
    for (label, value) in view
        .leads_chart
        .labels
        .iter()
        .zip(view.leads_chart.values.iter())
    {
        let height = if max_leads == 0 {
            2
        } else {
            2 + (78 * value / max_leads)
        };
        lead_bars.push_str(&format!(
            r#"<div style="display:flex;flex-direction:column;align-items:center;gap:4px;">
<span style="font-size:12px;">{value}</span>
<div style="width:28px;height:{height}px;background:{ACCENT};border-radius:3px 3px 0 0;"></div>
<span style="font-size:12px;color:#94a3b8;">{label}</span></div>"#
        ));
    }
    let lead_chart = format!(
        r#"<div style="background:#10243e;border-radius:8px;padding:16px;margin-bottom:24px;">
<h3 style="margin-top:0;">Leads, last 7 days</h3>
<div style="display:flex;align-items:flex-end;gap:12px;height:120px;">{lead_bars}</div></div>"#
    );

    let mut status_rows = String::new();
    for (label, value) in view
        .status_chart
        .labels
        .iter()
        .zip(view.status_chart.values.iter())
    {
        status_rows.push_str(&format!(
            r#"<span style="margin-right:16px;"><strong style="color:{ACCENT};">{value}</strong> {}</span>"#,
            html_escape(label)
        ));
    }
    let status_chart = format!(
        r#"<div style="background:#10243e;border-radius:8px;padding:16px;margin-bottom:24px;">
<h3 style="margin-top:0;">Appointments by status</h3>{status_rows}</div>"#
    );

    let leads_table = table(
        "Leads",
        &["Name", "Email", "Phone", "Message", "Source", "Created"],
        view.leads
            .iter()
            .map(|l| {
                vec![
                    l.name.clone(),
                    l.email.clone(),
                    l.phone.clone(),
                    l.message.clone(),
                    l.source.clone(),
                    l.created_at.clone(),
                ]
            })
            .collect(),
    );

    let appts_table = table(
        "Appointments",
        &["Id", "Title", "Time", "Status", "Contact", "Company"],
        view.appointments
            .iter()
            .map(|a| {
                vec![
                    a.id.clone(),
                    a.title.clone(),
                    a.time.clone(),
                    a.status.clone(),
                    a.user.name.clone(),
                    a.user.company.clone(),
                ]
            })
            .collect(),
    );

    let convs_table = table(
        "Conversations",
        &["Session", "User message", "Reply", "Time"],
        view.conversations
            .iter()
            .map(|c| {
                vec![
                    c.session_id.clone(),
                    c.user_message.clone(),
                    c.bot_response.clone(),
                    c.timestamp.clone(),
                ]
            })
            .collect(),
    );

    let users_table = table(
        "Users",
        &["Name", "Email", "Phone", "First seen", "Last seen", "Exchanges"],
        view.users
            .iter()
            .map(|u| {
                vec![
                    u.name.clone(),
                    u.email.clone(),
                    u.phone.clone(),
                    u.first_seen.clone(),
                    u.last_seen.clone(),
                    u.conversation_count.to_string(),
                ]
            })
            .collect(),
    );

    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Concierge dashboard</title></head>
<body style="font-family:system-ui,sans-serif;background:#0b1220;color:#e2e8f0;padding:24px;">
<div style="display:flex;justify-content:space-between;align-items:center;margin-bottom:16px;">
<h1 style="margin:0;">Concierge dashboard</h1>
<a href="/logout" style="color:{ACCENT};">Log out</a>
</div>
{banner}{tiles}{lead_chart}{status_chart}{leads_table}{appts_table}{convs_table}{users_table}
</body></html>"#
    )
}

fn tile(label: &str, value: u64) -> String {
    format!(
        r#"<div style="{TILE_STYLE}"><span style="display:block;font-size:28px;font-weight:700;color:{ACCENT};">{value}</span>{label}</div>"#
    )
}

fn table(title: &str, headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let head = headers
        .iter()
        .map(|h| format!(r#"<th style="text-align:left;padding:8px;color:{ACCENT};">{h}</th>"#))
        .collect::<String>();
    let body = if rows.is_empty() {
        format!(
            r#"<tr><td colspan="{}" style="padding:8px;color:#94a3b8;">No records.</td></tr>"#,
            headers.len()
        )
    } else {
        rows.iter()
            .map(|row| {
                let cells = row
                    .iter()
                    .map(|cell| {
                        format!(
                            r#"<td style="padding:8px;border-top:1px solid #1e3a5f;">{}</td>"#,
                            html_escape(cell)
                        )
                    })
                    .collect::<String>();
                format!("<tr>{cells}</tr>")
            })
            .collect::<String>()
    };
    format!(
        r#"<div style="background:#10243e;border-radius:8px;padding:16px;margin-bottom:24px;overflow-x:auto;">
<h3 style="margin-top:0;">{title}</h3>
<table style="width:100%;border-collapse:collapse;"><thead><tr>{head}</tr></thead><tbody>{body}</tbody></table></div>"#
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
