//! Coze 链接修饰器：优化 Coze 返回结果中的图片和网址链接
//!
//! 按固定顺序从待发送文本中提取四类图片链接（签名 byteimg 图片、.png 图片、
//! s.coze.cn 短链、带后缀的 .png 图片），逐条作为 IMAGE_URL 回复发出并从
//! 文本中删除；随后折叠紧挨着重复的链接，并去掉行尾 Markdown 链接外层的
//! 小括号（微信会把 ")" 当作网址一部分导致打不开）。

use std::collections::HashSet;

use async_trait::async_trait;
use cozebot_core::{
    Channel, Decorator, DecoratorError, EventAction, Reply, ReplyEvent, ReplyKind, Result,
    SessionContext,
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{info, instrument, warn};

/// 图片下载失败时上游写入的标记；带该标记的回复不再处理，避免反复触发
const DOWNLOAD_ERROR_MARKER: &str = "[DOWNLOAD_ERROR]";

/// 带签名参数的 byteimg 图片链接（rk3s、x-expires、x-signature 顺序固定）
static SIGNED_CDN_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"https://[a-zA-Z0-9-]+-bot-workflow-sign\.byteimg\.com/tos-cn-i-[a-zA-Z0-9]+/[a-zA-Z0-9]+\.png~tplv-[a-zA-Z0-9-]+-image\.png\?rk3s=[a-zA-Z0-9]+&x-expires=[0-9]+&x-signature=[a-zA-Z0-9%]+",
    )
    .unwrap()
});

/// 普通 .png 图片链接
static PNG_IMAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+\.png").unwrap());

/// Coze 短链（服务端重定向到实际图片）
static COZE_SHORT_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://s\.coze\.cn/t/\S+").unwrap());

/// 带 ~tplv 变换后缀或查询串的 .png 链接；按完整匹配去重
static SUFFIXED_PNG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+\.png(?:~tplv-\S+)?(?:\?.*)?").unwrap());

/// 任意 URL 串（用于折叠紧挨着重复的链接）
static URL_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

/// 行尾形如 "(url)" 的 Markdown 链接
static TRAILING_PAREN_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((https?://\S+)\)$").unwrap());

/// 文本处理结论：原样保留 / 原地更新 / 整体替换（有行级改写时）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOutcome {
    Unchanged,
    Updated(String),
    Replaced(String),
}

/// 重写结果：文本结论 + 按首次出现顺序提取出的图片链接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    pub outcome: TextOutcome,
    pub image_urls: Vec<String>,
}

/// 在当前文本中查找某一类链接，按首次出现顺序去重
fn unique_matches(re: &Regex, text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for m in re.find_iter(text) {
        if seen.insert(m.as_str().to_string()) {
            urls.push(m.as_str().to_string());
        }
    }
    urls
}

/// 提取一类链接并从文本中删除；返回本类提取到的条数。
/// 每类只跑一遍，后面的类别只会看到剩余文本。
fn extract_category(re: &Regex, text: &mut String, images: &mut Vec<String>) -> usize {
    let found = unique_matches(re, text);
    if found.is_empty() {
        return 0;
    }
    let count = found.len();
    images.extend(found);
    *text = re.replace_all(text, "").trim().to_string();
    count
}

/// 串首同一链接首尾相接重复时，折叠为一条并保留其后残余内容
/// （如行尾紧贴的标点：`UU,` → `U,`）
fn collapse_repeated_url(token: &str) -> String {
    let n = token.len();
    let bytes = token.as_bytes();
    for period in 1..=n / 2 {
        if !token.is_char_boundary(period) {
            continue;
        }
        let head = &bytes[..period];
        // 重复单元必须是 scheme 之后还有内容的完整链接
        let is_url = (head.starts_with(b"http://") && period > "http://".len())
            || (head.starts_with(b"https://") && period > "https://".len());
        if !is_url {
            continue;
        }
        let mut reps = 1;
        while (reps + 1) * period <= n && &bytes[reps * period..(reps + 1) * period] == head {
            reps += 1;
        }
        if reps >= 2 {
            let mut collapsed = String::with_capacity(n - (reps - 1) * period);
            collapsed.push_str(&token[..period]);
            collapsed.push_str(&token[reps * period..]);
            return collapsed;
        }
    }
    token.to_string()
}

/// 对一条待发送文本执行完整重写管线。
///
/// 纯函数：返回文本结论与提取出的图片链接，由调用方决定如何写回回复对象。
/// 文本进入时先去掉首尾空白；以 `[DOWNLOAD_ERROR]` 开头的内容直接放过。
pub fn rewrite_links(content: &str) -> RewriteResult {
    let trimmed = content.trim();
    if trimmed.starts_with(DOWNLOAD_ERROR_MARKER) {
        return RewriteResult {
            outcome: TextOutcome::Unchanged,
            image_urls: Vec::new(),
        };
    }

    let mut text = trimmed.to_string();
    let mut images = Vec::new();

    // 1. 签名 byteimg 图片
    extract_category(&SIGNED_CDN_IMAGE_RE, &mut text, &mut images);

    // 2. 普通 .png 图片
    let png_count = extract_category(&PNG_IMAGE_RE, &mut text, &mut images);
    if png_count > 0 {
        info!(count = png_count, "found unique .png images");
    }

    // 3. Coze 短链
    extract_category(&COZE_SHORT_LINK_RE, &mut text, &mut images);

    // 4. 带后缀的 .png 链接
    extract_category(&SUFFIXED_PNG_RE, &mut text, &mut images);

    // 5. 同一链接紧挨着重复拼接时只留一条（上游偶发把链接原样拼两遍）
    let collapsed = URL_TOKEN_RE
        .replace_all(&text, |caps: &Captures| collapse_repeated_url(&caps[0]))
        .into_owned();
    text = collapsed;

    // 6. 去掉行尾 Markdown 链接外层的小括号
    let mut changed = false;
    let new_lines: Vec<String> = text
        .split('\n')
        .map(|line| {
            let stripped = TRAILING_PAREN_URL_RE.replace(line, " $1");
            if stripped != line {
                changed = true;
            }
            stripped.into_owned()
        })
        .collect();

    if changed {
        info!(content = %text, "parenthesis around trailing url removed");
        RewriteResult {
            outcome: TextOutcome::Replaced(new_lines.join("\n").trim().to_string()),
            image_urls: images,
        }
    } else {
        RewriteResult {
            outcome: TextOutcome::Updated(text),
            image_urls: images,
        }
    }
}

/// 重写过程中的任何 panic 都按提取失败收口，由调用方记日志后放过原文
fn guard_rewrite<F>(f: F) -> std::result::Result<RewriteResult, DecoratorError>
where
    F: FnOnce() -> RewriteResult,
{
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(|panic| {
        let msg = if let Some(s) = panic.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        DecoratorError::Extraction(msg)
    })
}

/// Coze 链接修饰器
///
/// 只处理文本回复；提取到的图片链接先经 channel 逐条发出（发送失败只记日志，
/// 已发出的不回滚），再把清理后的文本写回事件；无论结果如何都放行后续处理。
pub struct CozeUrlDecorator;

/// 原插件注册用的优先级，供宿主装配时取用
pub const COZE_URL_PRIORITY: i32 = 77;

#[async_trait]
impl Decorator for CozeUrlDecorator {
    #[instrument(skip(self, event, channel, session))]
    async fn decorate(
        &self,
        event: &mut ReplyEvent,
        channel: &dyn Channel,
        session: &SessionContext,
    ) -> Result<()> {
        if event.reply.kind != ReplyKind::Text {
            event.action = EventAction::Continue;
            return Ok(());
        }

        let result = match guard_rewrite(|| rewrite_links(&event.reply.content)) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    content = %event.reply.content,
                    error = %e,
                    "link rewrite failed, passing reply through unchanged"
                );
                event.action = EventAction::Continue;
                return Ok(());
            }
        };

        // 图片回复先于文本结果发出
        for url in &result.image_urls {
            if let Err(e) = channel.send(Reply::image_url(url.as_str()), session).await {
                warn!(
                    url = %url,
                    content = %event.reply.content,
                    error = %e,
                    "failed to send extracted image reply"
                );
            }
        }

        match result.outcome {
            TextOutcome::Unchanged => {}
            TextOutcome::Updated(text) => event.reply.content = text,
            TextOutcome::Replaced(text) => event.reply = Reply::text(text),
        }

        event.action = EventAction::Continue;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_url(file_id: &str) -> String {
        format!(
            "https://p26-bot-workflow-sign.byteimg.com/tos-cn-i-mdko3gqilj/{}.png~tplv-mdko3gqilj-image.png?rk3s=81d4c505&x-expires=1735660800&x-signature=AbC%2Fd3f",
            file_id
        )
    }

    #[test]
    fn test_signed_cdn_urls_extracted_in_order_and_stripped() {
        let a = signed_url("aaaa1111");
        let b = signed_url("bbbb2222");
        let content = format!("图一 {} 图二 {} 再来一遍 {}", a, b, a);

        let result = rewrite_links(&content);

        assert_eq!(result.image_urls, vec![a.clone(), b.clone()]);
        match result.outcome {
            TextOutcome::Updated(text) => {
                assert!(!text.contains(&a));
                assert!(!text.contains(&b));
                assert!(text.contains("图一"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_png_urls_deduped_and_stripped() {
        let result = rewrite_links("see https://x.com/a.png https://x.com/a.png more");

        assert_eq!(result.image_urls, vec!["https://x.com/a.png".to_string()]);
        assert_eq!(
            result.outcome,
            TextOutcome::Updated("see   more".to_string())
        );
    }

    #[test]
    fn test_coze_short_link_extracted() {
        let result = rewrite_links("点这里 https://s.coze.cn/t/AbCdEf 查看");

        assert_eq!(
            result.image_urls,
            vec!["https://s.coze.cn/t/AbCdEf".to_string()]
        );
        assert_eq!(result.outcome, TextOutcome::Updated("点这里  查看".to_string()));
    }

    #[test]
    fn test_suffixed_png_pattern_covers_transform_and_query() {
        let m = SUFFIXED_PNG_RE
            .find("https://a.com/x.png~tplv-foo-image.png?k=1&v=2")
            .unwrap();
        assert_eq!(m.as_str(), "https://a.com/x.png~tplv-foo-image.png?k=1&v=2");
    }

    #[test]
    fn test_first_occurrence_order_across_categories() {
        // 文本里 png 在前、签名图在后，但签名图类别先跑，先被发出
        let signed = signed_url("cccc3333");
        let content = format!("https://x.com/z.png 然后 {}", signed);

        let result = rewrite_links(&content);

        assert_eq!(
            result.image_urls,
            vec![signed, "https://x.com/z.png".to_string()]
        );
    }

    #[test]
    fn test_repeated_url_token_collapses_to_one() {
        let url = "https://x.com/page";
        let tripled = format!("{0}{0}{0}", url);
        let result = rewrite_links(&format!("链接 {} 结束", tripled));

        assert_eq!(
            result.outcome,
            TextOutcome::Updated(format!("链接 {} 结束", url))
        );
        assert!(result.image_urls.is_empty());
    }

    #[test]
    fn test_fourfold_repeat_also_collapses_to_one() {
        let url = "https://x.com/p";
        let quadrupled = format!("{0}{0}{0}{0}", url);
        let result = rewrite_links(&quadrupled);

        assert_eq!(result.outcome, TextOutcome::Updated(url.to_string()));
    }

    #[test]
    fn test_repeat_with_trailing_punctuation_collapses() {
        // 重复的链接后面紧贴标点时也要折叠，标点保留
        let result = rewrite_links("https://x.com/pagehttps://x.com/page,");

        assert_eq!(
            result.outcome,
            TextOutcome::Updated("https://x.com/page,".to_string())
        );
    }

    #[test]
    fn test_repeat_inside_parens_collapses_then_strips_parens() {
        let result = rewrite_links("(https://x.com/ahttps://x.com/a)");

        assert_eq!(
            result.outcome,
            TextOutcome::Replaced("https://x.com/a".to_string())
        );
    }

    #[test]
    fn test_bare_scheme_prefix_not_treated_as_repeat() {
        // "https://" 自身重复不算链接重复
        let result = rewrite_links("https://https://x.com");

        assert_eq!(
            result.outcome,
            TextOutcome::Updated("https://https://x.com".to_string())
        );
    }

    #[test]
    fn test_guard_rewrite_maps_panic_to_extraction_error() {
        let err = guard_rewrite(|| panic!("bad pattern state")).unwrap_err();

        assert!(matches!(
            err,
            DecoratorError::Extraction(ref msg) if msg.contains("bad pattern state")
        ));
    }

    #[test]
    fn test_space_separated_duplicates_not_collapsed() {
        let result = rewrite_links("https://x.com/page https://x.com/page");

        assert_eq!(
            result.outcome,
            TextOutcome::Updated("https://x.com/page https://x.com/page".to_string())
        );
    }

    #[test]
    fn test_trailing_paren_url_replaced() {
        let result = rewrite_links("详情见(https://example.com/page)");

        assert_eq!(
            result.outcome,
            TextOutcome::Replaced("详情见 https://example.com/page".to_string())
        );
    }

    #[test]
    fn test_paren_url_not_at_line_end_kept() {
        let result = rewrite_links("前面(https://example.com/page)后面");

        assert_eq!(
            result.outcome,
            TextOutcome::Updated("前面(https://example.com/page)后面".to_string())
        );
    }

    #[test]
    fn test_multiline_paren_stripping_rejoins_all_lines() {
        let result = rewrite_links("第一行\n详情(https://example.com/a)\n第三行");

        assert_eq!(
            result.outcome,
            TextOutcome::Replaced("第一行\n详情 https://example.com/a\n第三行".to_string())
        );
    }

    #[test]
    fn test_download_error_marker_skips_processing() {
        let result = rewrite_links("[DOWNLOAD_ERROR] image failed https://x.com/a.png");

        assert_eq!(result.outcome, TextOutcome::Unchanged);
        assert!(result.image_urls.is_empty());
    }

    #[test]
    fn test_plain_text_only_trimmed() {
        let result = rewrite_links("  你好，世界  ");

        assert_eq!(result.outcome, TextOutcome::Updated("你好，世界".to_string()));
        assert!(result.image_urls.is_empty());
    }

    #[test]
    fn test_idempotent_on_cleaned_output() {
        let first = rewrite_links("see https://x.com/a.png and (https://e.com/p)");
        let cleaned = match first.outcome {
            TextOutcome::Updated(t) | TextOutcome::Replaced(t) => t,
            TextOutcome::Unchanged => panic!("expected rewritten text"),
        };

        let second = rewrite_links(&cleaned);

        assert!(second.image_urls.is_empty());
        assert_eq!(second.outcome, TextOutcome::Updated(cleaned));
    }
}
