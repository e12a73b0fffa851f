//! Self-contained HTML reports of the current analytics view.

use super::{design_stats::DesignRow, respondent_stats::RespondentRow};
use chrono::{DateTime, NaiveDate, Utc};

const STYLE: &str = "body { font-family: Arial, sans-serif; margin: 20px; } \
table { width: 100%; border-collapse: collapse; margin-top: 20px; } \
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; } \
th { background-color: #f2f2f2; } \
h1 { color: #333; } \
.header { margin-bottom: 20px; }";

const DESIGN_COLUMNS: [&str; 7] = [
    "Design Name",
    "Avg Quality Rating",
    "Avg Purchase Rating",
    "Total Ratings",
    "Quality Distribution",
    "Purchase Distribution",
    "Uploaded",
];

const RESPONDENT_COLUMNS: [&str; 8] = [
    "User Name",
    "Age",
    "Gender",
    "Avg Quality Rating",
    "Avg Purchase Rating",
    "Total Ratings",
    "Contact",
    "Last Submitted",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportKind {
    Design,
    User,
}

impl ReportKind {
    fn slug(self) -> &'static str {
        match self {
            ReportKind::Design => "design",
            ReportKind::User => "user",
        }
    }

    fn title(self) -> &'static str {
        match self {
            ReportKind::Design => "Design Analytics Report",
            ReportKind::User => "User Analytics Report",
        }
    }

    fn count_label(self) -> &'static str {
        match self {
            ReportKind::Design => "Total Designs",
            ReportKind::User => "Total Users",
        }
    }

    /// Download name, e.g. `design-analytics-2025-09-25.html`.
    pub fn file_name(self, date: NaiveDate) -> String {
        format!("{}-analytics-{}.html", self.slug(), date.format("%Y-%m-%d"))
    }
}

pub fn render_design_report(rows: &[DesignRow], generated_at: DateTime<Utc>) -> String {
    let body = rows
        .iter()
        .map(|row| {
            let stats = &row.stats;
            vec![
                row.design.name.clone(),
                format!("{:.1}/5", stats.avg_quality),
                format!("{:.1}/5", stats.avg_purchase),
                stats.total_ratings.to_string(),
                distribution_cell(stats.quality_distribution.iter()),
                distribution_cell(stats.purchase_distribution.iter()),
                row.design.uploaded_at.format("%Y-%m-%d").to_string(),
            ]
        })
        .collect::<Vec<_>>();
    render(ReportKind::Design, generated_at, &DESIGN_COLUMNS, &body)
}

pub fn render_respondent_report(rows: &[RespondentRow], generated_at: DateTime<Utc>) -> String {
    let body = rows
        .iter()
        .map(|row| {
            vec![
                row.display_name.clone(),
                row.user_data.age.to_string(),
                row.user_data.gender.to_string(),
                format!("{:.1}/5", row.stats.avg_quality),
                format!("{:.1}/5", row.stats.avg_purchase),
                row.stats.total_ratings.to_string(),
                row.user_data
                    .contact
                    .clone()
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| "N/A".into()),
                row.submitted_at.format("%Y-%m-%d").to_string(),
            ]
        })
        .collect::<Vec<_>>();
    render(ReportKind::User, generated_at, &RESPONDENT_COLUMNS, &body)
}

fn distribution_cell(counts: impl Iterator<Item = (u8, u32)>) -> String {
    counts
        .map(|(stars, count)| format!("{}★: {}", stars, count))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render(
    kind: ReportKind,
    generated_at: DateTime<Utc>,
    columns: &[&str],
    rows: &[Vec<String>],
) -> String {
    let mut html = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{STYLE}</style></head><body><div class=\"header\"><h1>{title}</h1>\
         <p>Generated on: {generated}</p><p>{label}: {count}</p></div>",
        title = kind.title(),
        generated = generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        label = kind.count_label(),
        count = rows.len(),
    );

    html.push_str("<table><thead><tr>");
    for column in columns {
        html.push_str(&format!("<th>{}</th>", html_escape(column)));
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", html_escape(cell)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table></body></html>");
    html
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
