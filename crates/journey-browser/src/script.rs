//! Injected page helpers for the Chrome implementation
//!
//! Every call evaluates the prelude plus one `__jr.<fn>(...)` invocation and
//! returns `JSON.stringify` of the result, so only strings cross CDP.

use serde_json::Value;

const PRELUDE: &str = r#"
const __jr = (() => {
  const norm = (s) => String(s || '').replace(/\s+/g, ' ').trim();
  const isVisible = (el) => {
    if (!el || el.nodeType !== 1) return false;
    const view = el.ownerDocument.defaultView || window;
    const style = view.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
  };
  const roots = () => {
    const out = [document];
    for (const f of Array.from(document.querySelectorAll('iframe, frame'))) {
      try { if (f.contentDocument) out.push(f.contentDocument); } catch (e) {}
    }
    return out;
  };
  const roleOf = (el) => {
    const explicit = (el.getAttribute('role') || '').trim().toLowerCase();
    if (explicit) return explicit.split(/\s+/)[0];
    const tag = el.tagName.toLowerCase();
    const type = (el.getAttribute('type') || '').toLowerCase();
    if (tag === 'button') return 'button';
    if (tag === 'a' && el.hasAttribute('href')) return 'link';
    if (tag === 'input') {
      if (['button', 'submit', 'reset', 'image'].includes(type)) return 'button';
      if (type === 'checkbox') return 'checkbox';
      if (type === 'radio') return 'radio';
      return 'textbox';
    }
    if (tag === 'textarea') return 'textbox';
    if (tag === 'select') return 'combobox';
    if (tag === 'nav') return 'navigation';
    if (tag === 'footer') return 'contentinfo';
    return '';
  };
  const accName = (el) => {
    const aria = el.getAttribute('aria-label');
    if (aria && aria.trim()) return norm(aria);
    const ids = (el.getAttribute('aria-labelledby') || '').split(/\s+/).filter(Boolean);
    if (ids.length) {
      const t = ids.map((id) => { const n = el.ownerDocument.getElementById(id); return n ? n.textContent : ''; }).join(' ');
      if (norm(t)) return norm(t);
    }
    const text = norm(el.innerText || el.textContent || '');
    if (text) return text;
    return norm(el.value || el.getAttribute('title') || el.getAttribute('alt') || '');
  };
  const matches = (value, m) => {
    const v = norm(value);
    if (!m) return true;
    if ('exact' in m) return v === norm(m.exact);
    if ('contains' in m) return v.toLowerCase().includes(norm(m.contains).toLowerCase());
    if ('regex' in m) { try { return new RegExp(m.regex, 'i').test(v); } catch (e) { return false; } }
    return false;
  };
  const css = (root, sel) => { try { return Array.from(root.querySelectorAll(sel)); } catch (e) { return []; } };
  const query = (root, q) => {
    switch (q.kind) {
      case 'css': return css(root, q.selector);
      case 'clickable_ancestor': return css(root, q.selector).map((el) => el.closest('button, a') || el);
      case 'test_id': return css(root, '[data-testid]').filter((el) => el.getAttribute('data-testid') === q.value);
      case 'aria_label': return css(root, '[aria-label]').filter((el) => matches(el.getAttribute('aria-label'), q.matcher));
      case 'role': return css(root, '*').filter((el) => roleOf(el) === String(q.role).toLowerCase() && matches(accName(el), q.name));
      case 'text': {
        const hits = css(root, 'body *').filter((el) =>
          !['script', 'style', 'noscript', 'template'].includes(el.tagName.toLowerCase())
          && matches(el.innerText || el.textContent || '', q.matcher));
        return hits.filter((el) => !hits.some((o) => o !== el && el.contains(o)));
      }
    }
    return [];
  };
  const pick = (t) => {
    const root = roots()[t.root];
    if (!root) return null;
    return query(root, t.query)[t.nth] || null;
  };
  const need = (t) => {
    const el = pick(t);
    if (!el) throw new Error('element not found: ' + JSON.stringify(t.query));
    return el;
  };
  const cssEscape = (s) => {
    try { if (window.CSS && CSS.escape) return CSS.escape(String(s)); } catch (e) {}
    return String(s).replace(/[^a-zA-Z0-9_\-]/g, (m) => `\\${m}`);
  };
  const cssPath = (el) => {
    if (!el || el.nodeType !== 1) return '';
    if (el.id) return `#${cssEscape(el.id)}`;
    const parts = [];
    let cur = el;
    let depth = 0;
    while (cur && cur.nodeType === 1 && depth < 8) {
      let part = cur.tagName.toLowerCase();
      const tid = cur.getAttribute('data-testid');
      if (tid && tid.length < 80 && !tid.includes('"') && !tid.includes("'")) part += `[data-testid="${tid}"]`;
      const parent = cur.parentElement;
      if (parent) {
        const same = Array.from(parent.children).filter((c) => c.tagName === cur.tagName);
        if (same.length > 1) part += `:nth-of-type(${same.indexOf(cur) + 1})`;
      }
      parts.unshift(part);
      if (cur.id) break;
      cur = parent;
      depth += 1;
    }
    return parts.join(' > ');
  };
  const pickLabel = (el) => {
    try {
      if (el.labels && el.labels.length) return norm(el.labels[0].innerText || el.labels[0].textContent).slice(0, 120);
    } catch (e) {}
    return (el.getAttribute('aria-label') || el.getAttribute('name') || el.id || '').trim().slice(0, 120);
  };
  const setValue = (el, value) => {
    const view = el.ownerDocument.defaultView || window;
    const proto = el.tagName.toLowerCase() === 'textarea' ? view.HTMLTextAreaElement.prototype
      : el.tagName.toLowerCase() === 'select' ? view.HTMLSelectElement.prototype
      : view.HTMLInputElement.prototype;
    const desc = Object.getOwnPropertyDescriptor(proto, 'value');
    if (desc && desc.set) desc.set.call(el, value); else el.value = value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
  };
  return {
    frameCount: () => roots().length - 1,
    count: (root, q) => { const r = roots()[root]; return r ? query(r, q).length : 0; },
    inspect: (t) => {
      const el = pick(t);
      if (!el) return null;
      const attributes = {};
      for (const a of Array.from(el.attributes)) attributes[a.name] = a.value;
      const r = el.getBoundingClientRect();
      const disabled = el.disabled === true || el.getAttribute('aria-disabled') === 'true';
      return {
        tag: el.tagName.toLowerCase(),
        text: norm(el.innerText || el.textContent || '').slice(0, 500),
        visible: isVisible(el),
        enabled: !disabled,
        attributes,
        bbox: { x: r.x, y: r.y, width: r.width, height: r.height },
      };
    },
    scrollIntoView: (t) => { need(t).scrollIntoView({ block: 'center', inline: 'nearest' }); return true; },
    click: (t) => { const el = need(t); el.scrollIntoView({ block: 'center', inline: 'nearest' }); el.click(); return true; },
    fill: (t, value) => { const el = need(t); el.focus(); setValue(el, value); return true; },
    check: (t) => { const el = need(t); if (!el.checked) el.click(); return !!el.checked; },
    select: (t, value) => { const el = need(t); setValue(el, value); return el.value === value; },
    pressEnter: (t) => {
      const el = need(t);
      for (const type of ['keydown', 'keypress', 'keyup']) {
        el.dispatchEvent(new KeyboardEvent(type, { key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true }));
      }
      if (el.form && el.form.requestSubmit) { try { el.form.requestSubmit(); } catch (e) {} }
      return true;
    },
    scrollMetrics: (t) => {
      const el = pick(t);
      if (!el) return null;
      return { scroll_left: el.scrollLeft, scroll_width: el.scrollWidth, client_width: el.clientWidth };
    },
    scrollBy: (dy) => { window.scrollBy(0, dy); return window.scrollY; },
    viewport: () => ({ width: window.innerWidth, height: window.innerHeight }),
    readyState: () => document.readyState === 'complete',
    inventory: () => {
      const nodes = css(document, '[data-testid], [aria-label], [role], button, a, input, select, textarea');
      const items = [];
      for (const el of nodes) {
        if (!isVisible(el)) continue;
        const raw = norm(el.innerText || el.textContent || '');
        const text = raw.length > 120 ? raw.slice(0, 117) + '...' : raw;
        const item = {
          tag: el.tagName.toLowerCase(),
          role: el.getAttribute('role') || null,
          aria_label: el.getAttribute('aria-label') || null,
          test_id: el.getAttribute('data-testid') || null,
          id: el.id || null,
          name_attr: el.getAttribute('name') || null,
          type_attr: el.getAttribute('type') || null,
          text,
          href: el.getAttribute('href') || null,
          css_path: cssPath(el),
          score: 0,
        };
        if (!item.aria_label && !item.test_id && !item.text && !item.id) continue;
        items.push(item);
      }
      return items;
    },
    formFields: () => {
      const out = [];
      for (const el of css(document, 'input, textarea, select')) {
        if (!isVisible(el)) continue;
        const tag = el.tagName.toLowerCase();
        const type = (el.getAttribute('type') || '').toLowerCase();
        if (tag === 'input' && (type === 'hidden' || type === 'password')) continue;
        const testId = el.getAttribute('data-testid') || '';
        const name = el.getAttribute('name') || '';
        const id = el.id || '';
        const placeholder = (el.getAttribute('placeholder') || '').trim();
        const autocomplete = (el.getAttribute('autocomplete') || '').trim();
        const label = pickLabel(el);
        const hint = [label, placeholder, autocomplete, name, id, testId, type].filter(Boolean).join(' | ').slice(0, 240);
        let selector = '';
        if (testId) selector = `[data-testid="${testId.replace(/"/g, '\\"')}"]`;
        else if (id) selector = `#${cssEscape(id)}`;
        else if (name) selector = `[name="${name.replace(/"/g, '\\"')}"]`;
        const options = tag === 'select'
          ? Array.from(el.options || []).slice(0, 25).map((o) => ({ value: (o.value || '').trim(), label: norm(o.label || o.textContent).slice(0, 120), disabled: !!o.disabled }))
          : [];
        out.push({
          tag, type, label, hint, autocomplete,
          pattern: (el.getAttribute('pattern') || '').trim(),
          test_id: testId, name, id, selector,
          value: String(el.value || ''),
          checked: tag === 'input' && (type === 'checkbox' || type === 'radio') ? !!el.checked : null,
          options,
        });
        if (out.length >= 200) break;
      }
      return out;
    },
    alerts: () => {
      const sels = ['[role="alert"]', '[aria-live="assertive"]', '[aria-live="polite"]', '[aria-invalid="true"]', '.error', '.errors', '.invalid', '.form-error', '.helper-text'];
      const items = [];
      for (const sel of sels) {
        for (const el of css(document, sel)) {
          if (!isVisible(el)) continue;
          const t = norm(el.innerText || el.textContent || '');
          if (!t) continue;
          items.push(t.slice(0, 240));
          if (items.length >= 15) return items;
        }
      }
      return items;
    },
    pageSize: () => ({ width: document.documentElement.scrollWidth, height: document.documentElement.scrollHeight }),
  };
})();
"#;

/// Build an expression calling `__jr.<function>(...args)`
pub fn call(function: &str, args: &[Value]) -> String {
    let args = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "(() => {{ {} return JSON.stringify(__jr.{}({})); }})()",
        PRELUDE, function, args
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_embeds_json_arguments() {
        let expr = call("count", &[json!(0), json!({"kind": "css", "selector": "a[href=\"x\"]"})]);
        assert!(expr.starts_with("(() => {"));
        assert!(expr.contains(r#"__jr.count(0, {"kind":"css","selector":"a[href=\"x\"]"})"#));
        assert!(expr.ends_with("})()"));
    }
}
