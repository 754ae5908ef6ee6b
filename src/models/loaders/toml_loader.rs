//! 字段目录的 TOML 加载器

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

use crate::models::catalog::FieldCatalog;

/// 从 TOML 文件加载字段目录
pub async fn load_catalog(catalog_path: &Path) -> Result<FieldCatalog> {
    let content = fs::read_to_string(catalog_path)
        .await
        .with_context(|| format!("无法读取目录文件: {}", catalog_path.display()))?;

    let catalog: FieldCatalog = toml::from_str(&content)
        .with_context(|| format!("无法解析目录文件: {}", catalog_path.display()))?;

    if catalog.fields.is_empty() {
        anyhow::bail!("目录文件中没有任何字段定义: {}", catalog_path.display());
    }

    tracing::info!(
        "已加载字段目录 [{}]: {} 个字段, {} 条共享单元格规则",
        catalog.family,
        catalog.fields.len(),
        catalog.shared_cells.len()
    );

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use crate::models::catalog::FieldCatalog;

    #[test]
    fn test_parse_catalog_toml() {
        let toml_str = r#"
            family = "health_policy"
            format_rules = ["Amounts keep their currency symbol"]

            [[fields]]
            name = "Deductible"
            synonyms = ["Excess"]
            format_hint = "currency"

            [[fields]]
            name = "CoInsurance"

            [[shared_cells]]
            primary = "CoInsurance"
            secondary = "Deductible"
        "#;

        let catalog: FieldCatalog = toml::from_str(toml_str).unwrap();
        assert_eq!(catalog.family, "health_policy");
        assert_eq!(catalog.field_names(), vec!["Deductible", "CoInsurance"]);
        assert_eq!(catalog.field("Deductible").unwrap().synonyms, vec!["Excess"]);
        assert!(catalog.field("CoInsurance").unwrap().synonyms.is_empty());
        assert_eq!(catalog.shared_cells[0].primary, "CoInsurance");
    }
}
