//! Script payloads injected into the editor page
//!
//! Channels are exposed to the page as global functions named after the
//! channel (`window.log(text)`, `window.htmlPostContent(html)`), so every
//! payload that talks back to the host goes through the same `post` helper.

use crate::bridge::channel::ChannelName;
use std::borrow::Cow;

/// When a payload runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPoint {
    /// Registered with the surface before load; runs in every new document
    BeforeLoad,
    /// Evaluated once after the navigation commits
    AfterCommit,
    /// Evaluated when the host asks for it
    OnDemand,
}

/// A named script paired with its lifecycle point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPayload {
    /// Stable payload name, used in logs and errors
    pub name: &'static str,
    /// Script source
    pub source: Cow<'static, str>,
    /// When the payload must run
    pub point: InjectionPoint,
}

/// Page-side helper shared by all payloads
const POST_HELPER: &str = r#"
    const post = (name, body) => {
        const send = window[name];
        if (typeof send === 'function') {
            send(String(body));
        }
    };
"#;

const LOGGING_SHIM_BODY: &str = r#"
        const original = console.log.bind(console);
        console.log = (...args) => {
            try {
                post('log', args.map(a => typeof a === 'string' ? a : JSON.stringify(a)).join(' '));
            } catch (e) {
                post('log', String(e));
            }
            original(...args);
        };
        window.addEventListener('error', (event) => {
            post('log', 'Uncaught: ' + event.message);
        });
"#;

const INSERT_CSS: &str = r#"
    (() => {
        const css = `
            #wpadminbar, #adminmenumain, .edit-post-header__settings .editor-post-publish-button__button,
            .edit-post-header__settings .editor-post-publish-panel__toggle,
            .edit-post-header__settings .editor-post-save-draft,
            .edit-post-header__settings .editor-post-preview,
            .edit-post-fullscreen-mode-close { display: none !important; }
            #wpcontent, #wpbody-content { margin-left: 0 !important; padding-top: 0 !important; }
            html.wp-toolbar { padding-top: 0 !important; }
        `;
        const style = document.createElement('style');
        style.id = 'webedit-injected-style';
        style.textContent = css;
        (document.head || document.documentElement).appendChild(style);
        return 'style-injected';
    })()
"#;

const HTML_POST_CONTENT: &str = r#"
    (() => {
        const editor = window.wp && window.wp.data && window.wp.data.select('core/block-editor');
        if (!editor || !window.wp.blocks) {
            throw new Error('block editor not ready');
        }
        const html = window.wp.blocks.serialize(editor.getBlocks());
        const send = window['htmlPostContent'];
        if (typeof send !== 'function') {
            throw new Error('htmlPostContent channel missing');
        }
        send(html);
    })()
"#;

/// Read-only catalog of the bridge's payloads
pub struct ScriptCatalog;

impl ScriptCatalog {
    /// Forwards `console.log` and uncaught errors to the `log` channel
    pub fn logging_shim() -> InjectionPayload {
        InjectionPayload {
            name: "logging_shim",
            source: Cow::Owned(format!("(() => {{{POST_HELPER}{LOGGING_SHIM_BODY}}})();")),
            point: InjectionPoint::BeforeLoad,
        }
    }

    /// Hides admin chrome around the editor; run once after commit
    pub fn insert_css() -> InjectionPayload {
        InjectionPayload {
            name: "insert_css",
            source: Cow::Borrowed(INSERT_CSS),
            point: InjectionPoint::AfterCommit,
        }
    }

    /// Serializes the editor's blocks and posts them on `htmlPostContent`
    pub fn html_post_content() -> InjectionPayload {
        InjectionPayload {
            name: "html_post_content",
            source: Cow::Borrowed(HTML_POST_CONTENT),
            point: InjectionPoint::OnDemand,
        }
    }

    /// Replaces the editor's blocks with `block_html` once the editor is ready
    pub fn seed_content(block_html: &str) -> InjectionPayload {
        // JSON string literals are valid JS string literals
        let literal = serde_json::Value::String(block_html.to_string()).to_string();
        let source = format!(
            r#"
            (() => {{
                {helper}
                const content = {literal};
                const seed = () => {{
                    const wp = window.wp;
                    if (!wp || !wp.data || !wp.blocks || !wp.data.select('core/block-editor')) {{
                        return false;
                    }}
                    wp.data.dispatch('core/block-editor').resetBlocks(wp.blocks.parse(content));
                    post('log', 'seeded editor content');
                    return true;
                }};
                const wait = () => {{
                    if (!seed()) {{
                        setTimeout(wait, 100);
                    }}
                }};
                if (document.readyState === 'complete') {{
                    wait();
                }} else {{
                    window.addEventListener('load', wait);
                }}
            }})();
            "#,
            helper = POST_HELPER,
            literal = literal,
        );

        InjectionPayload {
            name: "seed_content",
            source: Cow::Owned(source),
            point: InjectionPoint::BeforeLoad,
        }
    }

    /// Closed set of channels the page may post on
    pub fn channels() -> &'static [ChannelName] {
        &ChannelName::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_points() {
        assert_eq!(ScriptCatalog::logging_shim().point, InjectionPoint::BeforeLoad);
        assert_eq!(ScriptCatalog::insert_css().point, InjectionPoint::AfterCommit);
        assert_eq!(
            ScriptCatalog::html_post_content().point,
            InjectionPoint::OnDemand
        );
        assert_eq!(
            ScriptCatalog::seed_content("<p>x</p>").point,
            InjectionPoint::BeforeLoad
        );
    }

    #[test]
    fn test_extraction_posts_on_html_channel() {
        let payload = ScriptCatalog::html_post_content();
        assert!(payload
            .source
            .contains(ChannelName::HtmlPostContent.as_str()));
    }

    #[test]
    fn test_logging_shim_posts_on_log_channel() {
        assert!(ScriptCatalog::logging_shim().source.contains("'log'"));
    }

    #[test]
    fn test_seed_content_escapes_html() {
        let payload = ScriptCatalog::seed_content("<p class=\"a\">it's\n</p>");
        assert!(payload
            .source
            .contains(r#"const content = "<p class=\"a\">it's\n</p>";"#));
    }

    #[test]
    fn test_channels_closed_set() {
        assert_eq!(
            ScriptCatalog::channels(),
            &[ChannelName::Log, ChannelName::HtmlPostContent]
        );
    }
}
