//! The single HTML page served at `/`.
//!
//! The page is static; it drives the JSON API under `/api/session` and
//! renders each exchange with the bot and user message templates below,
//! substituting `{{MSG}}` with the HTML-escaped text.

pub const CSS: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; display: flex; min-height: 100vh; }
aside { width: 22rem; padding: 1rem; background: #f0f2f6; box-sizing: border-box; }
main { flex: 1; padding: 1.5rem 2rem; }
aside label { display: block; margin-top: 1rem; font-size: .9rem; }
aside input, aside select, aside button { width: 100%; margin-top: .3rem; box-sizing: border-box; }
.notice { padding: .5rem .7rem; border-radius: .4rem; margin-top: .5rem; font-size: .9rem; }
.notice.info { background: #dbeafe; }
.notice.success { background: #dcfce7; }
.notice.warning { background: #fef9c3; }
.notice.error { background: #fee2e2; }
.chat-message { padding: 1.2rem; border-radius: .5rem; margin-bottom: 1rem; display: flex; }
.chat-message.user { background-color: #2b313e; }
.chat-message.bot { background-color: #475063; }
.chat-message .avatar { width: 15%; font-size: 2rem; }
.chat-message .message { width: 85%; padding: 0 1.2rem; color: #fff; white-space: pre-wrap; }
.hidden { display: none; }
"#;

pub const BOT_TEMPLATE: &str = r#"<div class="chat-message bot">
    <div class="avatar">🎲</div>
    <div class="message">{{MSG}}</div>
</div>"#;

pub const USER_TEMPLATE: &str = r#"<div class="chat-message user">
    <div class="avatar">🧑</div>
    <div class="message">{{MSG}}</div>
</div>"#;

const SHELL: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{TITLE}}</title>
<style>{{CSS}}</style>
</head>
<body>
<aside>
  <label>Your OpenAI API key
    <input id="key" type="password" autocomplete="off">
  </label>
  <div id="games-box" class="hidden">
    <label>Choose a game
      <select id="games"></select>
    </label>
  </div>
  <div id="upload-box" class="hidden">
    <label>Or, if your game is missing, upload its rules as PDF (&lt;ID&gt;_&lt;type&gt;.pdf) and press Process
      <input id="file" type="file" accept="application/pdf">
    </label>
    <button id="process">Process</button>
  </div>
  <div id="notices"></div>
</aside>
<main>
  <h1>{{TITLE}}</h1>
  <div id="ask-box" class="hidden">
    <label id="ask-label" for="question"></label>
    <input id="question" type="text" style="width:100%">
  </div>
  <div id="history"></div>
</main>
<template id="bot-template">{{BOT_TEMPLATE}}</template>
<template id="user-template">{{USER_TEMPLATE}}</template>
<script>
const $ = (id) => document.getElementById(id);
let sessionId = null;

function escapeHtml(s) {
  return s.replace(/&/g, "&amp;").replace(/</g, "&lt;").replace(/>/g, "&gt;")
          .replace(/"/g, "&quot;").replace(/'/g, "&#39;");
}

function fill(templateId, text) {
  // A function replacement keeps `$&`-style patterns in the text literal.
  return $(templateId).innerHTML.replace("{{MSG}}", () => escapeHtml(text));
}

function render(view) {
  const ready = view.state !== "no_key";
  $("upload-box").classList.toggle("hidden", !ready);
  $("games-box").classList.toggle("hidden", !ready || view.games.length === 0);
  $("ask-box").classList.toggle("hidden", !ready || view.games.length === 0);

  const select = $("games");
  select.innerHTML = view.games.map((g) => `<option>${escapeHtml(g)}</option>`).join("");
  select.selectedIndex = view.selected_index;
  const current = view.games[view.selected_index] || "";
  $("ask-label").textContent = `Ask me about the rules of: '${current}'`;

  $("notices").innerHTML = view.notices
    .map((n) => `<div class="notice ${n.level}">${escapeHtml(n.message)}</div>`)
    .join("");

  $("history").innerHTML = view.exchanges
    .map((e) => fill("user-template", e.question) + fill("bot-template", e.answer))
    .join("");
}

async function call(method, path, body) {
  const opts = { method };
  if (body instanceof FormData) {
    opts.body = body;
  } else if (body !== undefined) {
    opts.headers = { "Content-Type": "application/json" };
    opts.body = JSON.stringify(body);
  }
  const res = await fetch(path, opts);
  const json = await res.json();
  if (!res.ok) {
    render({ state: "no_key", games: [], selected_index: 0, exchanges: [],
             notices: [{ level: "error", message: json.error.message }] });
    return;
  }
  render(json);
}

async function start() {
  const res = await fetch("/api/session", { method: "POST" });
  const view = await res.json();
  sessionId = view.id;
  render(view);
  window.addEventListener("pagehide", () => {
    fetch(`/api/session/${sessionId}`, { method: "DELETE", keepalive: true });
  });
}

$("key").addEventListener("change", (e) =>
  call("POST", `/api/session/${sessionId}/key`, { key: e.target.value }));
$("games").addEventListener("change", (e) =>
  call("POST", `/api/session/${sessionId}/select`, { game: e.target.value }));
$("process").addEventListener("click", () => {
  const form = new FormData();
  const file = $("file").files[0];
  if (file) form.append("file", file, file.name);
  $("process").disabled = true;
  call("POST", `/api/session/${sessionId}/upload`, form)
    .finally(() => { $("process").disabled = false; });
});
$("question").addEventListener("keydown", (e) => {
  if (e.key !== "Enter" || !e.target.value.trim()) return;
  call("POST", `/api/session/${sessionId}/ask`, { question: e.target.value });
});

start();
</script>
</body>
</html>
"#;

/// Assembles the page.
pub fn page(title: &str) -> String {
    SHELL
        .replace("{{CSS}}", CSS)
        .replace("{{BOT_TEMPLATE}}", BOT_TEMPLATE)
        .replace("{{USER_TEMPLATE}}", USER_TEMPLATE)
        .replace("{{TITLE}}", title)
}
