//! Deterministic template generator
//!
//! Used when every LLM provider has failed and the entry point allows a
//! template fallback. Same input always gives the same article.

use crate::model::{GeneratedContent, Resource};

pub const DISCLAIMER_HEADING: &str = "## ⚠️ 免责声明";

struct CategoryTemplate {
    heading_emoji: &'static str,
    features_heading: &'static str,
    features: &'static [&'static str],
    usage_heading: &'static str,
    usage: &'static str,
    disclaimer: &'static str,
    image_prompt: &'static str,
    with_poster: bool,
}

static MOVIE: CategoryTemplate = CategoryTemplate {
    heading_emoji: "🎬",
    features_heading: "资源特色",
    features: &[
        "精心挑选的优质内容",
        "高清画质，观影体验佳",
        "多种格式，设备兼容性好",
        "更新及时，内容丰富",
    ],
    usage_heading: "使用说明",
    usage: "本资源仅供个人学习和交流使用，请支持正版内容。",
    disclaimer: "本站仅提供资源信息分享，不存储任何文件。所有资源均来源于网络公开分享，如有版权问题，请联系删除。",
    image_prompt: "cinema abstract art, film reels, dark blue theme",
    with_poster: true,
};

static SOFTWARE: CategoryTemplate = CategoryTemplate {
    heading_emoji: "🛠️",
    features_heading: "工具特点",
    features: &[
        "功能实用，操作简便",
        "兼容性好，稳定可靠",
        "定期测试，确保可用",
        "持续更新，功能完善",
    ],
    usage_heading: "安装说明",
    usage: "请从官方渠道下载并验证软件完整性和安全性。",
    disclaimer: "请支持正版软件，本分享仅供学习交流。如有版权问题，请联系删除。",
    image_prompt: "software icons abstract, technology theme, modern design",
    with_poster: false,
};

static EDUCATION: CategoryTemplate = CategoryTemplate {
    heading_emoji: "📚",
    features_heading: "资源亮点",
    features: &[
        "内容丰富，覆盖面广",
        "结构清晰，易于学习",
        "持续更新，保持新鲜",
        "适合自学和提升",
    ],
    usage_heading: "学习建议",
    usage: "建议制定合理的学习计划，循序渐进地掌握知识。",
    disclaimer: "本资源仅供学习交流使用，请尊重知识产权。如有版权问题，请联系删除。",
    image_prompt: "books and knowledge abstract art, warm light",
    with_poster: false,
};

static GENERIC: CategoryTemplate = CategoryTemplate {
    heading_emoji: "🌟",
    features_heading: "资源特色",
    features: &[
        "高质量内容，精心筛选",
        "分类清晰，便于查找",
        "定期更新，持续提供新鲜内容",
    ],
    usage_heading: "使用说明",
    usage: "建议根据个人需求选择合适的内容，合理使用资源。",
    disclaimer: "本站仅提供信息分享，不承担任何版权责任。请仅用于个人学习交流，支持正版内容。如有侵权，请联系删除。",
    image_prompt: "abstract digital art, modern gradient colors",
    with_poster: false,
};

fn template_for(category: &str) -> &'static CategoryTemplate {
    match category {
        "电影" | "影视" | "剧集" | "动画" => &MOVIE,
        "软件" | "工具" => &SOFTWARE,
        "教育" | "学习" | "图书" => &EDUCATION,
        _ => &GENERIC,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateProvider;

impl TemplateProvider {
    /// Provider name reported when the template wins
    pub const NAME: &'static str = "template";

    pub fn render(&self, resource: &Resource) -> GeneratedContent {
        let template = template_for(&resource.category);

        let mut content = format!("# {}\n\n", resource.title);
        if template.with_poster {
            content.push_str("{{poster}}\n\n");
        }
        if !resource.description.is_empty() {
            content.push_str(&resource.description);
            content.push_str("\n\n");
        }
        content.push_str(&format!(
            "## {} {}\n\n",
            template.heading_emoji, template.features_heading
        ));
        for feature in template.features {
            content.push_str(&format!("- {}\n", feature));
        }
        content.push_str(&format!(
            "\n## 📋 {}\n\n{}\n\n{}\n\n{}\n\n**请支持正版，尊重版权！**",
            template.usage_heading, template.usage, DISCLAIMER_HEADING, template.disclaimer
        ));

        let tags = if resource.tags.is_empty() {
            vec!["资源".to_string(), "分享".to_string()]
        } else {
            resource.tags.clone()
        };

        let excerpt = if resource.description.is_empty() {
            format!(
                "为{}爱好者整理的高质量资源分享：{}。",
                resource.category, resource.title
            )
        } else {
            crate::model::truncate_chars(&resource.description, 100)
        };

        GeneratedContent {
            title: resource.title.clone(),
            excerpt,
            content,
            tags,
            image_prompt: template.image_prompt.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(category: &str) -> Resource {
        Resource {
            title: "科幻电影资源分享".to_string(),
            category: category.to_string(),
            tags: vec!["科幻".to_string(), "经典".to_string()],
            description: String::new(),
            download_link: None,
        }
    }

    #[test]
    fn test_movie_template_has_disclaimer_and_poster_slot() {
        let content = TemplateProvider.render(&resource("电影"));
        assert!(content.content.contains(DISCLAIMER_HEADING));
        assert!(content.content.contains("{{poster}}"));
        assert!(content.content.contains("高清画质"));
        assert_eq!(content.tags, vec!["科幻", "经典"]);
        assert!(!content.excerpt.is_empty());
        assert!(!content.image_prompt.is_empty());
    }

    #[test]
    fn test_unknown_category_uses_generic_template() {
        let content = TemplateProvider.render(&resource("other"));
        assert!(content.content.contains(DISCLAIMER_HEADING));
        assert!(!content.content.contains("{{poster}}"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let r = resource("软件");
        assert_eq!(TemplateProvider.render(&r), TemplateProvider.render(&r));
    }
}
