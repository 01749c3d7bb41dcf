//! The HTML dashboard.
//!
//! Three panels rendered server-side from the latest snapshot:
//! a per-class line chart over the window, the class totals, and the
//! hashtag ranking. The page reloads itself once per refresh interval.

use axum::extract::State;
use axum::response::IntoResponse;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use murmur_core::{DashboardSnapshot, HashtagCount, SentimentClass, TimeBucket};

use crate::state::AppState;

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 240.0;

const CLASSES: [SentimentClass; 3] = [
    SentimentClass::Positive,
    SentimentClass::Neutral,
    SentimentClass::Negative,
];

const PAGE_CSS: &str = r#"
*{margin:0;padding:0;box-sizing:border-box}
:root{--bg:#fafafa;--fg:#111;--fg2:#555;--fg3:#999;--surface:#fff;--border:rgba(0,0,0,.08);--pos:#16a34a;--neu:#64748b;--neg:#dc2626;--mono:"SF Mono",SFMono-Regular,ui-monospace,Menlo,monospace}
body{font-family:Inter,-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,sans-serif;line-height:1.5;color:var(--fg);background:var(--bg);display:flex;flex-direction:column;align-items:center;padding:1.5rem 1rem}
main{max-width:880px;width:100%}
h1{font-size:1.5rem;font-weight:700;letter-spacing:-.02em}
h2{font-size:1rem;font-weight:600;margin-bottom:.75rem;color:var(--fg2)}
.meta{font-size:.85rem;color:var(--fg3);margin-bottom:1.5rem}
.panel{background:var(--surface);border:1px solid var(--border);border-radius:10px;padding:1.25rem;margin-bottom:1rem}
.empty{color:var(--fg3);text-align:center;padding:2rem 0}
svg.chart{width:100%;height:auto}
svg.chart polyline{fill:none;stroke-width:2}
.totals{display:grid;grid-template-columns:repeat(3,1fr);gap:1rem}
.total{text-align:center}
.total-count{font-size:1.75rem;font-weight:700}
.total-share{font-family:var(--mono);font-size:.85rem;color:var(--fg3)}
.positive{color:var(--pos);stroke:var(--pos)}
.neutral{color:var(--neu);stroke:var(--neu)}
.negative{color:var(--neg);stroke:var(--neg)}
.legend{display:flex;gap:1rem;font-size:.8rem;margin-top:.5rem}
.tags{list-style:none}
.tag{display:grid;grid-template-columns:10rem 1fr 3rem;align-items:center;gap:.75rem;margin:.3rem 0;font-size:.9rem}
.tag-name{overflow:hidden;text-overflow:ellipsis;white-space:nowrap}
.tag-bar{height:.6rem;border-radius:3px;background:#6366f1}
.tag-count{font-family:var(--mono);text-align:right;color:var(--fg2)}
"#;

/// `GET /`
pub async fn dashboard_page(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot();
    render(
        &snapshot,
        state.config.window.as_secs(),
        state.config.refresh_interval.as_secs(),
    )
}

fn render(snapshot: &DashboardSnapshot, window_secs: u64, refresh_secs: u64) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                meta http-equiv="refresh" content=(refresh_secs);
                title { "Murmur - live sentiment" }
                style { (PreEscaped(PAGE_CSS)) }
            }
            body {
                main {
                    h1 { "Live sentiment" }
                    p class="meta" {
                        "Last " (window_label(window_secs)) " · "
                        (snapshot.record_count) " posts · updated "
                        (snapshot.generated_at.format("%H:%M:%S UTC"))
                    }

                    @if snapshot.is_empty() {
                        div class="panel empty" {
                            "No posts in the last " (window_label(window_secs)) "."
                        }
                    } @else {
                        section class="panel" {
                            h2 { "Sentiment over time (" (snapshot.bucket_width_secs) "s buckets)" }
                            (chart(&snapshot.timeseries))
                            div class="legend" {
                                @for class in CLASSES {
                                    span class=(class.as_str()) { "● " (class.label()) }
                                }
                            }
                        }
                        section class="panel" {
                            h2 { "Totals" }
                            div class="totals" {
                                @for class in CLASSES {
                                    div class={ "total " (class.as_str()) } {
                                        div class="total-count" { (snapshot.totals.count(class)) }
                                        div class="total-share" {
                                            (percent(snapshot.totals.proportion(class)))
                                        }
                                        div { (class.label()) }
                                    }
                                }
                            }
                        }
                        section class="panel" {
                            h2 { "Top hashtags" }
                            (hashtag_list(&snapshot.top_hashtags))
                        }
                    }
                }
            }
        }
    }
}

fn chart(buckets: &[TimeBucket]) -> Markup {
    let max = buckets
        .iter()
        .flat_map(|b| CLASSES.iter().map(move |c| b.count(*c)))
        .max()
        .unwrap_or(0)
        .max(1);

    html! {
        svg class="chart" viewBox=(format!("0 0 {} {}", CHART_WIDTH, CHART_HEIGHT))
            preserveAspectRatio="none" role="img" aria-label="Sentiment counts per bucket" {
            @for class in CLASSES {
                polyline class=(class.as_str()) points=(polyline_points(buckets, class, max));
            }
        }
    }
}

/// SVG `points` for one class, scaled so `max` touches the top edge.
fn polyline_points(buckets: &[TimeBucket], class: SentimentClass, max: u64) -> String {
    let step = if buckets.len() > 1 {
        CHART_WIDTH / (buckets.len() - 1) as f64
    } else {
        0.0
    };

    buckets
        .iter()
        .enumerate()
        .map(|(i, bucket)| {
            let x = i as f64 * step;
            let y = CHART_HEIGHT - (bucket.count(class) as f64 / max as f64) * CHART_HEIGHT;
            format!("{:.1},{:.1}", x, y)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn hashtag_list(tags: &[HashtagCount]) -> Markup {
    let max = tags.iter().map(|t| t.count).max().unwrap_or(1).max(1);

    html! {
        @if tags.is_empty() {
            p class="empty" { "No hashtags in this window." }
        } @else {
            ol class="tags" {
                @for tag in tags {
                    li class="tag" {
                        span class="tag-name" { "#" (tag.tag) }
                        div class="tag-bar" style=(bar_width(tag.count, max)) {}
                        span class="tag-count" { (tag.count) }
                    }
                }
            }
        }
    }
}

fn percent(share: f64) -> String {
    format!("{:.1}%", share * 100.0)
}

fn bar_width(count: u64, max: u64) -> String {
    format!("width:{:.0}%", count as f64 / max as f64 * 100.0)
}

fn window_label(secs: u64) -> String {
    if secs % 3600 == 0 {
        format!("{} h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{} min", secs / 60)
    } else {
        format!("{} s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bucket(secs: i64, positive: u64, neutral: u64, negative: u64) -> TimeBucket {
        TimeBucket {
            start: Utc.timestamp_opt(secs, 0).unwrap(),
            positive,
            neutral,
            negative,
        }
    }

    #[test]
    fn test_polyline_scales_to_chart() {
        let buckets = vec![bucket(0, 0, 1, 2), bucket(5, 4, 0, 0)];
        assert_eq!(
            polyline_points(&buckets, SentimentClass::Positive, 4),
            "0.0,240.0 800.0,0.0"
        );
        assert_eq!(
            polyline_points(&buckets, SentimentClass::Negative, 4),
            "0.0,120.0 800.0,240.0"
        );
    }

    #[test]
    fn test_single_bucket_chart() {
        let buckets = vec![bucket(0, 1, 0, 0)];
        assert_eq!(
            polyline_points(&buckets, SentimentClass::Positive, 1),
            "0.0,0.0"
        );
    }

    #[test]
    fn test_window_label() {
        assert_eq!(window_label(600), "10 min");
        assert_eq!(window_label(3600), "1 h");
        assert_eq!(window_label(45), "45 s");
    }

    #[test]
    fn test_render_empty_window() {
        let snapshot = DashboardSnapshot::compute(
            &[],
            Utc::now(),
            &murmur_core::AggregateConfig::default(),
        );
        let html = render(&snapshot, 600, 60).into_string();
        assert!(html.contains("No posts in the last 10 min."));
        assert!(html.contains("content=\"60\""));
    }
}
