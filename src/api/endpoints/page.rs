//! Upload form served at `/`.

use axum::response::Html;

/// `GET /`
pub async fn upload_form() -> Html<&'static str> {
    Html(UPLOAD_PAGE_HTML)
}

// Self-contained, no external resources.
const UPLOAD_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Brainslice - Upload scan</title>
  <style>
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', system-ui, sans-serif;
      background: #fafaf9; color: #1c1917;
      min-height: 100vh; display: flex; flex-direction: column;
      align-items: center; justify-content: center; padding: 24px;
    }
    h1 { font-size: 24px; margin-bottom: 8px; }
    p { color: #78716c; font-size: 14px; margin-bottom: 24px; text-align: center; }
    form { display: flex; flex-direction: column; gap: 12px; width: 100%; max-width: 360px; }
    .btn {
      padding: 16px; border-radius: 12px; font-size: 16px; font-weight: 500;
      cursor: pointer; border: none; background: #4a7c59; color: white;
    }
    .btn:disabled { opacity: 0.5; cursor: not-allowed; }
    pre { margin-top: 24px; max-width: 640px; white-space: pre-wrap; font-size: 13px; }
  </style>
</head>
<body>
  <h1>Upload a NIfTI volume</h1>
  <p>Accepted formats: .nii and .nii.gz. The volume is sliced into PNG images.</p>

  <form id="upload-form" action="/upload" method="post" enctype="multipart/form-data">
    <input type="file" name="file" accept=".nii,.gz" required>
    <button class="btn" type="submit" id="submit">Upload</button>
  </form>

  <pre id="result"></pre>

  <script>
    var form = document.getElementById('upload-form');
    var submit = document.getElementById('submit');
    var result = document.getElementById('result');

    form.addEventListener('submit', function(e) {
      e.preventDefault();
      submit.disabled = true;
      result.textContent = 'Processing...';
      fetch('/upload', { method: 'POST', body: new FormData(form) })
        .then(function(r) { return r.json(); })
        .then(function(body) { result.textContent = JSON.stringify(body, null, 2); })
        .catch(function(err) { result.textContent = 'Upload failed: ' + err; })
        .finally(function() { submit.disabled = false; });
    });
  </script>
</body>
</html>
"#;
