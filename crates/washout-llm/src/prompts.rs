//! Extraction instruction for the vision model.
//!
//! The instruction is fixed: names only, exactly as printed, as a bare JSON
//! array. Anything else the model returns is rejected by the parser.

/// Instruction sent alongside every prescription image.
pub const EXTRACTION_INSTRUCTION: &str = r#"この画像は処方薬の明細です。

画像内に記載されている「薬剤名のみ」を抽出してください。

【重要】
・人名、日付、医療機関名、効用、服用方法、注意事項は除外
・用量（mg、錠、回数など）は除外
・推測は禁止
・画像に明確に読める薬剤名だけをそのまま出力する
・存在しない薬剤名を作らない

必ずJSON配列のみで出力してください。

例：
["アクトス","バファリン"]"#;
