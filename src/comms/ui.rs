//! Root page: a minimal chat form that posts to `/chat`.

use axum::response::Html;

const ROOT_INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Codex Pipeline</title>
  <style>
    *, *::before, *::after { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: system-ui, -apple-system, sans-serif;
      background: #0f0f0f; color: #e0e0e0;
      display: flex; flex-direction: column; align-items: center;
      height: 100vh; padding: 2rem;
    }
    h1 { font-size: 1.5rem; margin-bottom: 1rem; }
    #log {
      width: 100%; max-width: 720px; flex: 1; overflow-y: auto;
      border: 1px solid #333; border-radius: 12px; background: #1a1a1a;
      padding: 1rem; white-space: pre-wrap; font-size: 0.9rem;
    }
    .user { color: #c0c0e0; margin-bottom: 0.5rem; }
    .assistant { color: #e0e0e0; margin-bottom: 1rem; }
    .origin { color: #666; font-size: 0.75rem; }
    form { width: 100%; max-width: 720px; display: flex; gap: 0.5rem; margin-top: 1rem; }
    input {
      flex: 1; padding: 0.5rem; border-radius: 8px;
      border: 1px solid #333; background: #1a1a1a; color: #e0e0e0;
    }
    button {
      padding: 0.5rem 1.5rem; border: none; border-radius: 8px;
      background: #2a2a3a; color: #c0c0e0; cursor: pointer;
    }
    button:hover { background: #3a3a5a; }
  </style>
</head>
<body>
  <h1>Codex Pipeline</h1>
  <div id="log"></div>
  <form id="chat">
    <input id="message" autocomplete="off" placeholder="Ask something..." />
    <button type="submit">Send</button>
  </form>
  <script>
    let sessionId = null;
    const log = document.getElementById('log');
    const input = document.getElementById('message');

    function append(cls, text) {
      const div = document.createElement('div');
      div.className = cls;
      div.textContent = text;
      log.appendChild(div);
      log.scrollTop = log.scrollHeight;
      return div;
    }

    document.getElementById('chat').addEventListener('submit', async (ev) => {
      ev.preventDefault();
      const message = input.value.trim();
      if (!message) return;
      input.value = '';
      append('user', '> ' + message);
      try {
        const res = await fetch('/chat', {
          method: 'POST',
          headers: { 'Content-Type': 'application/json' },
          body: JSON.stringify({ message, session_id: sessionId }),
        });
        const body = await res.json();
        if (!res.ok) {
          append('assistant', 'error: ' + (body.detail || res.status));
          return;
        }
        sessionId = body.session_id;
        append('assistant', body.response);
        append('origin', body.origin);
      } catch (e) {
        append('assistant', 'error: ' + e);
      }
    });
  </script>
</body>
</html>
"#;

/// GET /
pub(super) async fn root() -> Html<&'static str> {
    Html(ROOT_INDEX_HTML)
}
