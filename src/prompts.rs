//! Prompt templates and per-provider generation parameters

use std::str::FromStr;

use serde::Serialize;

use crate::model::Resource;

/// Writing style selecting one of the prompt templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PromptStyle {
    MovieReview,
    Casual,
    Basic,
    #[default]
    Enhanced,
    Safe,
}

impl FromStr for PromptStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "movie-review" | "movie_review" | "movie" => Ok(Self::MovieReview),
            "casual" => Ok(Self::Casual),
            "basic" => Ok(Self::Basic),
            "enhanced" => Ok(Self::Enhanced),
            "safe" => Ok(Self::Safe),
            other => Err(format!("unknown prompt style: {}", other)),
        }
    }
}

const JSON_CONTRACT: &str = r#"请严格按以下JSON格式返回，并放在 ```json 代码块中：
{
  "title": "文章标题",
  "excerpt": "文章摘要",
  "content": "文章正文(markdown格式)",
  "tags": ["标签1", "标签2"],
  "imagePrompt": "配图提示词"
}"#;

const MOVIE_REVIEW_TEMPLATE: &str = r#"你是一位资深影评人，请为以下影视资源撰写一篇影评风格的博客文章。

资源信息：
- 名称：{title}
- 分类：{category}
- 标签：{tags}
- 描述：{description}
- 资源链接：{downloadLink}

写作要求：
1. 开头用两三句话交代影片的类型、年代和看点
2. 中间从剧情节奏、视听表现、人物塑造三个角度点评，避免剧透关键情节
3. 在正文合适位置单独一行写 {{poster}} 作为海报占位符
4. 结尾给出观影建议，并附上"仅供学习交流，请支持正版"的免责声明
5. 正文300-500字，使用markdown小标题

"#;

const CASUAL_TEMPLATE: &str = r#"用轻松聊天的口吻，为下面这份网盘资源写一篇分享帖。

- 名称：{title}
- 分类：{category}
- 标签：{tags}
- 简介：{description}
- 链接：{downloadLink}

要求：语气亲切自然，像朋友推荐一样；介绍资源亮点和适合谁用；最后加一段免责声明。正文300字左右。

"#;

const BASIC_TEMPLATE: &str = r#"请为以下网盘资源生成博客文章，要求规避版权风险：

资源信息：
- 分类：{category}
- 标签：{tags}
- 描述：{description}

要求：
1. 标题通用化，避免具体作品名称
2. 重点强调资源特性和使用价值
3. 包含免责声明
4. 内容300-500字

"#;

const ENHANCED_TEMPLATE: &str = r#"你是一个专业的内容创作者，请为网盘资源创建博客文章。

背景：
- 这是一个合法的资源分享博客
- 需要规避版权风险
- 重点在于教育和信息分享

资源信息：
- 名称：{title}
- 分类：{category}
- 标签：{tags}
- 描述：{description}

内容要求：
1. 标题设计：突出价值和质量，20字以内
2. 内容结构：开头简介资源类型和特点；中间详述使用价值和适用场景；结尾给出使用建议和免责声明
3. 写作风格：专业、客观、实用，避免过度营销语言
4. 合规要求：必须包含"仅供学习交流"、"支持正版"以及免责声明
5. 摘要50-80字，正文300-500字，标签3-6个

"#;

const SAFE_TEMPLATE: &str = r#"创建一篇关于{category}资源的信息性文章。

要求：
- 完全避免版权敏感内容
- 重点介绍资源类型和使用建议
- 包含完整的法律免责声明
- 语言专业、客观

"#;

impl PromptStyle {
    fn template(self) -> &'static str {
        match self {
            Self::MovieReview => MOVIE_REVIEW_TEMPLATE,
            Self::Casual => CASUAL_TEMPLATE,
            Self::Basic => BASIC_TEMPLATE,
            Self::Enhanced => ENHANCED_TEMPLATE,
            Self::Safe => SAFE_TEMPLATE,
        }
    }
}

/// Render the prompt for `style`. Placeholders are replaced verbatim, so a
/// title that itself contains `{category}` will be substituted again.
pub fn render(style: PromptStyle, resource: &Resource) -> String {
    let body = style
        .template()
        .replace("{title}", &resource.title)
        .replace("{category}", &resource.category)
        .replace("{tags}", &resource.tags_joined(", "))
        .replace("{description}", &resource.description)
        .replace(
            "{downloadLink}",
            resource.download_link.as_deref().unwrap_or("暂无"),
        );
    format!("{}{}", body, JSON_CONTRACT)
}

/// Length bounds the generated article should respect
#[derive(Debug, Clone, Copy)]
pub struct ContentStandards {
    pub excerpt_chars: (usize, usize),
    pub tags_count: (usize, usize),
}

pub const CONTENT_STANDARDS: ContentStandards = ContentStandards {
    excerpt_chars: (50, 100),
    tags_count: (3, 8),
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeminiParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

pub const GEMINI_PARAMS: GeminiParams = GeminiParams {
    temperature: 0.8,
    max_output_tokens: 1500,
    top_p: 0.9,
    top_k: 40,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CohereParams {
    pub model: &'static str,
    pub temperature: f32,
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

pub const COHERE_PARAMS: CohereParams = CohereParams {
    model: "command",
    temperature: 0.75,
    max_tokens: 800,
    presence_penalty: 0.1,
    frequency_penalty: 0.1,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WenxinParams {
    pub temperature: f32,
    pub top_p: f32,
    pub penalty_score: f32,
    pub max_output_tokens: u32,
}

pub const WENXIN_PARAMS: WenxinParams = WenxinParams {
    temperature: 0.8,
    top_p: 0.9,
    penalty_score: 1.1,
    max_output_tokens: 1500,
};
