use crate::Result;
use crate::log::LOG_COLUMNS;
use crate::record::ObservationRecord;

/// Render the observation log as a self-contained HTML page (rows embedded as JSON).
///
/// Filled with `replace` instead of `format!()`: the JS template literals
/// (`${x}`) are full of braces.
pub fn render_log_html(records: &[ObservationRecord], title: &str) -> Result<String> {
    // `</` would end the script element early.
    let rows = serde_json::to_string(records)?.replace("</", "<\\/");
    let columns = serde_json::to_string(&LOG_COLUMNS)?;

    const TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>__TITLE__</title>
<style>
  body { font-family: system-ui, -apple-system, Segoe UI, Roboto, Arial, sans-serif; margin: 0; }
  header { padding: 12px 16px; border-bottom: 1px solid #ddd; display: flex; gap: 16px; align-items: center; }
  .main { padding: 12px; overflow: auto; }
  .pill { padding: 4px 8px; border: 1px solid #ddd; border-radius: 999px; background: #fafafa; font-size: 14px; }

  table { border-collapse: collapse; width: 100%; }
  th, td { border-bottom: 1px solid #eee; padding: 4px 8px; text-align: left; font-size: 13px; white-space: nowrap; }
  th { position: sticky; top: 0; background: white; border-bottom: 1px solid #ddd; }
  tr.calibration { color: #777; }
  tr.standard { background: #f4f9ff; }
  tr.moving td:nth-child(6) { color: #b35c00; font-weight: 600; }
  .num { text-align: right; font-variant-numeric: tabular-nums; }
</style>
</head>
<body>
<header>
  <b>__TITLE__</b>
  <span class="pill" id="summary"></span>
  <input id="search" placeholder="Filter target..." style="padding: 6px 8px; border: 1px solid #ddd; border-radius: 6px;">
</header>

<div class="main">
  <table>
    <thead><tr id="head"></tr></thead>
    <tbody id="body"></tbody>
  </table>
</div>

<script>
const COLUMNS = __COLUMNS__;
const ROWS = __ROWS__;
const NUMERIC = new Set(["INDEX", "MJD", "AIRMASS", "INTEGRATION", "COADDS", "FILE_NUMBER"]);

function escapeHtml(s) {
  return String(s)
    .replaceAll("&", "&amp;")
    .replaceAll("<", "&lt;")
    .replaceAll(">", "&gt;")
    .replaceAll('"', "&quot;")
    .replaceAll("'", "&#39;");
}

function cell(col, v) {
  if (v === null || v === undefined) v = "";
  if (col === "MJD" && v !== "") v = Number(v).toFixed(6);
  const cls = NUMERIC.has(col) ? ' class="num"' : "";
  return `<td${cls}>${escapeHtml(v)}</td>`;
}

function render(filter) {
  const head = document.getElementById("head");
  head.innerHTML = COLUMNS.map(c => `<th>${escapeHtml(c)}</th>`).join("");

  const f = (filter || "").toLowerCase();
  const shown = ROWS.filter(r => !f || String(r.TARGET_NAME).toLowerCase().includes(f));
  const body = document.getElementById("body");
  body.innerHTML = shown.map(r => {
    const cls = `${r.TARGET_TYPE} ${r["FIXED-MOVING"]}`;
    return `<tr class="${escapeHtml(cls)}">` + COLUMNS.map(c => cell(c, r[c])).join("") + "</tr>";
  }).join("");

  document.getElementById("summary").textContent = `${shown.length} of ${ROWS.length} exposures`;
}

document.getElementById("search").addEventListener("input", (e) => render(e.target.value));
render("");
</script>
</body>
</html>
"#;

    Ok(TEMPLATE
        .replace("__TITLE__", &escape_html(title))
        .replace("__COLUMNS__", &columns)
        .replace("__ROWS__", &rows))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::record;

    #[test]
    fn script_cannot_be_closed_by_row_text() {
        let r = record("spc0001.a.fits", "</script><b>", 1);
        let html = render_log_html(&[r], "A & B").unwrap();
        assert!(!html.contains("</script><b>"));
        assert!(html.contains("<title>A &amp; B</title>"));
        assert!(html.contains(r#"const COLUMNS = ["FILE","INDEX""#));
    }
}
