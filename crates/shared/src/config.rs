use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "lawgeek-digest";

#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: Option<String>,
    pub llm_api_base_url: String,
    pub llm_model: String,
    pub backend_url: String,
    pub plan_id: Option<String>,
    pub feishu_app_id: Option<String>,
    pub feishu_app_secret: Option<String>,
    pub feishu_base_url: String,
    pub feishu_doc_url_base: String,
    pub feishu_folder_token: Option<String>,
    pub report_title_template: String,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::try_load_dotenv();

        let data_dir = match non_empty_var("DIGEST_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .context("Could not determine local data directory; set DIGEST_DATA_DIR")?
                .join(APP_DIR),
        };

        Ok(Self {
            llm_api_key: non_empty_var("LLM_API_KEY"),
            llm_api_base_url: var_or(
                "LLM_API_BASE_URL",
                "https://dashscope.aliyuncs.com/compatible-mode/v1",
            ),
            llm_model: var_or("LLM_MODEL", "qwen-plus"),
            backend_url: var_or("NEWS_BACKEND_URL", "https://apis.memenews.cn"),
            plan_id: non_empty_var("NEWS_PLAN_ID"),
            feishu_app_id: non_empty_var("FEISHU_APP_ID"),
            feishu_app_secret: non_empty_var("FEISHU_APP_SECRET"),
            feishu_base_url: var_or("FEISHU_BASE_URL", "https://open.feishu.cn/open-apis"),
            feishu_doc_url_base: var_or(
                "FEISHU_DOC_URL_BASE",
                "https://bytedance.larkoffice.com/docx",
            ),
            feishu_folder_token: non_empty_var("FEISHU_FOLDER_TOKEN"),
            report_title_template: var_or(
                "REPORT_TITLE_TEMPLATE",
                "vol.{vol}｜LawGeek Legal Tech Weekly",
            ),
            data_dir,
        })
    }

    pub fn llm_api_key(&self) -> Result<&str> {
        self.llm_api_key.as_deref().context(
            "LLM_API_KEY not found.\n\n\
            To fix this, create ~/.config/lawgeek-digest/.env with:\n  \
            LLM_API_KEY=your_key_here\n\n\
            Or run with --no-ai to ingest without classification and highlighting.",
        )
    }

    pub fn plan_id(&self) -> Result<&str> {
        self.plan_id.as_deref().context(
            "NEWS_PLAN_ID not found.\n\n\
            Add NEWS_PLAN_ID=<plan id> to ~/.config/lawgeek-digest/.env",
        )
    }

    pub fn feishu_credentials(&self) -> Result<(&str, &str)> {
        let app_id = self.feishu_app_id.as_deref();
        let app_secret = self.feishu_app_secret.as_deref();
        match (app_id, app_secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => anyhow::bail!(
                "FEISHU_APP_ID / FEISHU_APP_SECRET not found.\n\n\
                To fix this, add both to ~/.config/lawgeek-digest/.env:\n  \
                FEISHU_APP_ID=cli_xxx\n  \
                FEISHU_APP_SECRET=your_secret_here"
            ),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("news_database.csv")
    }

    pub fn card_dir(&self) -> PathBuf {
        self.data_dir.join("cards")
    }

    pub fn report_title(&self, volume: &str) -> String {
        self.report_title_template.replace("{vol}", volume)
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/lawgeek-digest/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join(APP_DIR).join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    non_empty_var(name).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            llm_api_key: None,
            llm_api_base_url: "http://localhost".to_string(),
            llm_model: "m".to_string(),
            backend_url: "http://localhost".to_string(),
            plan_id: None,
            feishu_app_id: Some("id".to_string()),
            feishu_app_secret: None,
            feishu_base_url: "http://localhost".to_string(),
            feishu_doc_url_base: "http://localhost/docx".to_string(),
            feishu_folder_token: None,
            report_title_template: "vol.{vol}｜Weekly".to_string(),
            data_dir: PathBuf::from("/tmp/digest"),
        }
    }

    #[test]
    fn test_report_title_substitutes_volume() {
        assert_eq!(sample().report_title("12"), "vol.12｜Weekly");
    }

    #[test]
    fn test_missing_secrets_are_reported() {
        let config = sample();
        assert!(config.llm_api_key().is_err());
        assert!(config.plan_id().is_err());
        // Secret without id or id without secret is still missing
        assert!(config.feishu_credentials().is_err());
    }

    #[test]
    fn test_store_path_lives_in_data_dir() {
        assert_eq!(
            sample().store_path(),
            PathBuf::from("/tmp/digest/news_database.csv")
        );
    }
}
