//! # CIF 格式读写
//!
//! 读取：晶胞参数、`_atom_site_fract_*` 或 `_atom_site_Cartn_*` 坐标循环，
//! 以及 `_symmetry_equiv_pos_as_xyz` / `_space_group_symop_operation_xyz`
//! 对称操作循环 (展开为 P1 并去重)。只读取第一个数据块。
//!
//! 写出：P1 空间群，分数坐标。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`, `models/element.rs`
//! - 使用 `regex` 解析对称操作字符串

use crate::error::{CalcError, Result};
use crate::models::element;
use crate::models::structure::{norm, Atom, Crystal, Lattice};

use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// 展开对称操作后判定重复原子的笛卡尔距离 (Å)
const DUPLICATE_TOL: f64 = 1e-3;

static TERM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+-]?[^+-]+").expect("valid term regex"));

/// 解析 CIF 文件
pub fn parse_cif_file(path: &Path) -> Result<Crystal> {
    let content = fs::read_to_string(path).map_err(|e| CalcError::read(path, e))?;
    parse_cif_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

fn parse_error(name: &str, reason: impl Into<String>) -> CalcError {
    CalcError::ParseError {
        format: "cif".to_string(),
        path: name.to_string(),
        reason: reason.into(),
    }
}

// ─────────────────────────────────────────────────────────────
// 词法分析
// ─────────────────────────────────────────────────────────────

/// 切分 CIF 记号：支持引号字符串和分号文本块
fn tokenize(content: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut lines = content.lines().peekable();

    while let Some(line) = lines.next() {
        if line.starts_with(';') {
            // 文本块：直到下一行以 ';' 开头
            let mut text = line[1..].to_string();
            for next in lines.by_ref() {
                if next.starts_with(';') {
                    break;
                }
                text.push('\n');
                text.push_str(next);
            }
            tokens.push(text.trim().to_string());
            continue;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c.is_whitespace() {
                i += 1;
            } else if c == '#' {
                break;
            } else if c == '\'' || c == '"' {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                // 结束引号后必须是空白或行尾
                while j < chars.len()
                    && !(chars[j] == quote
                        && (j + 1 == chars.len() || chars[j + 1].is_whitespace()))
                {
                    j += 1;
                }
                tokens.push(chars[start..j.min(chars.len())].iter().collect());
                i = j + 1;
            } else {
                let start = i;
                while i < chars.len() && !chars[i].is_whitespace() {
                    i += 1;
                }
                tokens.push(chars[start..i].iter().collect());
            }
        }
    }
    tokens
}

/// CIF 数据块：单值标签和循环表
#[derive(Debug, Default)]
struct CifBlock {
    name: String,
    values: HashMap<String, String>,
    loops: Vec<CifLoop>,
}

#[derive(Debug, Default)]
struct CifLoop {
    tags: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CifLoop {
    fn column(&self, tag: &str) -> Option<usize> {
        self.tags.iter().position(|t| t == tag)
    }
}

fn is_reserved(token: &str) -> bool {
    token.starts_with('_')
        || token.eq_ignore_ascii_case("loop_")
        || token.to_ascii_lowercase().starts_with("data_")
}

fn parse_block(tokens: &[String]) -> CifBlock {
    let mut block = CifBlock::default();
    let mut i = 0;
    let mut seen_data = false;

    while i < tokens.len() {
        let token = &tokens[i];
        let lower = token.to_ascii_lowercase();
        if lower.starts_with("data_") {
            if seen_data {
                break;
            }
            seen_data = true;
            block.name = token[5..].to_string();
            i += 1;
        } else if lower == "loop_" {
            i += 1;
            let mut cif_loop = CifLoop::default();
            while i < tokens.len() && tokens[i].starts_with('_') {
                cif_loop.tags.push(tokens[i].to_ascii_lowercase());
                i += 1;
            }
            let mut values = Vec::new();
            while i < tokens.len() && !is_reserved(&tokens[i]) {
                values.push(tokens[i].clone());
                i += 1;
            }
            if !cif_loop.tags.is_empty() {
                for chunk in values.chunks(cif_loop.tags.len()) {
                    if chunk.len() == cif_loop.tags.len() {
                        cif_loop.rows.push(chunk.to_vec());
                    }
                }
            }
            block.loops.push(cif_loop);
        } else if token.starts_with('_') {
            if let Some(value) = tokens.get(i + 1).filter(|v| !is_reserved(v)) {
                block.values.insert(lower, value.clone());
                i += 2;
            } else {
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    block
}

/// 解析数值，忽略标准不确定度 "3.615(2)"
fn parse_number(value: &str) -> Option<f64> {
    let cleaned = value.split('(').next().unwrap_or(value).trim();
    cleaned.parse().ok()
}

// ─────────────────────────────────────────────────────────────
// 对称操作
// ─────────────────────────────────────────────────────────────

/// 解析 "x, y+1/2, -z" 形式的对称操作
pub fn parse_symop(op: &str) -> Option<([[i32; 3]; 3], [f64; 3])> {
    let cleaned: String = op
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '"')
        .collect::<String>()
        .to_lowercase();
    let parts: Vec<&str> = cleaned.split(',').collect();
    if parts.len() != 3 {
        return None;
    }

    let mut rotation = [[0i32; 3]; 3];
    let mut translation = [0.0; 3];
    for (row, part) in parts.iter().enumerate() {
        for m in TERM_RE.find_iter(part) {
            let term = m.as_str();
            let (sign, body) = match term.chars().next() {
                Some('-') => (-1.0, &term[1..]),
                Some('+') => (1.0, &term[1..]),
                _ => (1.0, term),
            };
            let axis = body.find(['x', 'y', 'z']);
            match axis {
                Some(pos) => {
                    let var = body[pos..].chars().next()?;
                    let coef_str = body[..pos].trim_end_matches('*');
                    let coef = if coef_str.is_empty() {
                        1.0
                    } else {
                        parse_fraction(coef_str)?
                    };
                    let col = match var {
                        'x' => 0,
                        'y' => 1,
                        _ => 2,
                    };
                    rotation[row][col] += (sign * coef).round() as i32;
                }
                None => translation[row] += sign * parse_fraction(body)?,
            }
        }
    }
    Some((rotation, translation))
}

fn parse_fraction(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let d: f64 = den.parse().ok()?;
            if d == 0.0 {
                return None;
            }
            Some(num.parse::<f64>().ok()? / d)
        }
        None => s.parse().ok(),
    }
}

// ─────────────────────────────────────────────────────────────
// 结构组装
// ─────────────────────────────────────────────────────────────

/// 从字符串内容解析 CIF 格式
pub fn parse_cif_content(content: &str, default_name: &str) -> Result<Crystal> {
    let block = parse_block(&tokenize(content));
    let name = if block.name.is_empty() {
        default_name.to_string()
    } else {
        block.name.clone()
    };

    let cell_value = |tag: &str| -> Result<f64> {
        block
            .values
            .get(tag)
            .and_then(|v| parse_number(v))
            .ok_or_else(|| parse_error(&name, format!("Missing or invalid {}", tag)))
    };
    let lattice = Lattice::from_parameters(
        cell_value("_cell_length_a")?,
        cell_value("_cell_length_b")?,
        cell_value("_cell_length_c")?,
        cell_value("_cell_angle_alpha")?,
        cell_value("_cell_angle_beta")?,
        cell_value("_cell_angle_gamma")?,
    );

    // 原子位置循环
    let site_loop = block
        .loops
        .iter()
        .find(|l| {
            l.column("_atom_site_fract_x").is_some() || l.column("_atom_site_cartn_x").is_some()
        })
        .ok_or_else(|| parse_error(&name, "No _atom_site coordinate loop"))?;

    let (cols, cartesian) = match (
        site_loop.column("_atom_site_fract_x"),
        site_loop.column("_atom_site_fract_y"),
        site_loop.column("_atom_site_fract_z"),
    ) {
        (Some(x), Some(y), Some(z)) => ([x, y, z], false),
        _ => match (
            site_loop.column("_atom_site_cartn_x"),
            site_loop.column("_atom_site_cartn_y"),
            site_loop.column("_atom_site_cartn_z"),
        ) {
            (Some(x), Some(y), Some(z)) => ([x, y, z], true),
            _ => return Err(parse_error(&name, "Incomplete coordinate columns")),
        },
    };
    let symbol_col = site_loop
        .column("_atom_site_type_symbol")
        .or_else(|| site_loop.column("_atom_site_label"))
        .ok_or_else(|| parse_error(&name, "No _atom_site_type_symbol or _atom_site_label"))?;

    let mut sites: Vec<(String, [f64; 3])> = Vec::new();
    for row in &site_loop.rows {
        let symbol = element::symbol_from_label(&row[symbol_col]).ok_or_else(|| {
            parse_error(&name, format!("Unknown element label '{}'", row[symbol_col]))
        })?;
        let mut v = [0.0; 3];
        for k in 0..3 {
            v[k] = parse_number(&row[cols[k]]).ok_or_else(|| {
                parse_error(&name, format!("Invalid coordinate '{}'", row[cols[k]]))
            })?;
        }
        let frac = if cartesian { lattice.cart_to_frac(v) } else { v };
        sites.push((symbol.to_string(), frac));
    }

    // 对称操作循环
    let symops: Vec<([[i32; 3]; 3], [f64; 3])> = block
        .loops
        .iter()
        .find_map(|l| {
            l.column("_symmetry_equiv_pos_as_xyz")
                .or_else(|| l.column("_space_group_symop_operation_xyz"))
                .map(|c| (l, c))
        })
        .map(|(l, c)| -> Result<Vec<_>> {
            l.rows
                .iter()
                .map(|r| {
                    parse_symop(&r[c]).ok_or_else(|| {
                        parse_error(&name, format!("Invalid symmetry operation '{}'", r[c]))
                    })
                })
                .collect()
        })
        .transpose()?
        .unwrap_or_default();

    let atoms = expand_sites(&lattice, &sites, &symops);
    let crystal = Crystal::new(name, lattice, atoms);
    crystal.validate()?;
    Ok(crystal)
}

/// 用对称操作展开不等价位置并去重
fn expand_sites(
    lattice: &Lattice,
    sites: &[(String, [f64; 3])],
    symops: &[([[i32; 3]; 3], [f64; 3])],
) -> Vec<Atom> {
    let identity = ([[1, 0, 0], [0, 1, 0], [0, 0, 1]], [0.0; 3]);
    let ops: Vec<_> = if symops.is_empty() {
        vec![identity]
    } else {
        symops.to_vec()
    };

    let mut expanded: Vec<(String, [f64; 3])> = Vec::new();
    for (symbol, frac) in sites {
        for (w, t) in &ops {
            let mut image = [0.0; 3];
            for i in 0..3 {
                let v: f64 = (0..3).map(|j| w[i][j] as f64 * frac[j]).sum::<f64>() + t[i];
                image[i] = v - (v + 1e-9).floor();
            }
            let duplicate = expanded.iter().any(|(s, f)| {
                if s != symbol {
                    return false;
                }
                let mut d = [0.0; 3];
                for k in 0..3 {
                    let x = image[k] - f[k];
                    d[k] = x - x.round();
                }
                norm(lattice.frac_to_cart(d)) < DUPLICATE_TOL
            });
            if !duplicate {
                expanded.push((symbol.clone(), image));
            }
        }
    }

    expanded
        .into_iter()
        .map(|(s, f)| Atom::new(s, lattice.frac_to_cart(f)))
        .collect()
}

/// 转换为 CIF 格式 (P1)
pub fn to_cif_string(crystal: &Crystal) -> String {
    let (a, b, c, alpha, beta, gamma) = crystal.lattice.parameters();

    let mut result = String::new();
    let name = if crystal.name.trim().is_empty() {
        crystal.formula()
    } else {
        crystal.name.replace(char::is_whitespace, "_")
    };
    result.push_str(&format!("data_{}\n", name));
    result.push_str("_symmetry_space_group_name_H-M    'P 1'\n");
    result.push_str("_symmetry_Int_Tables_number       1\n");
    result.push_str(&format!("_chemical_formula_sum    '{}'\n\n", crystal.formula()));

    result.push_str(&format!("_cell_length_a    {:.8}\n", a));
    result.push_str(&format!("_cell_length_b    {:.8}\n", b));
    result.push_str(&format!("_cell_length_c    {:.8}\n", c));
    result.push_str(&format!("_cell_angle_alpha {:.8}\n", alpha));
    result.push_str(&format!("_cell_angle_beta  {:.8}\n", beta));
    result.push_str(&format!("_cell_angle_gamma {:.8}\n", gamma));
    result.push_str(&format!(
        "_cell_volume      {:.8}\n\n",
        crystal.lattice.volume().abs()
    ));

    result.push_str("loop_\n");
    result.push_str("_symmetry_equiv_pos_as_xyz\n");
    result.push_str("  'x, y, z'\n\n");

    result.push_str("loop_\n");
    result.push_str("_atom_site_label\n");
    result.push_str("_atom_site_type_symbol\n");
    result.push_str("_atom_site_fract_x\n");
    result.push_str("_atom_site_fract_y\n");
    result.push_str("_atom_site_fract_z\n");
    result.push_str("_atom_site_occupancy\n");

    for (i, (atom, frac)) in crystal
        .atoms
        .iter()
        .zip(crystal.frac_positions())
        .enumerate()
    {
        result.push_str(&format!(
            "{}{} {} {:.10} {:.10} {:.10} 1.0\n",
            atom.element,
            i + 1,
            atom.element,
            frac[0],
            frac[1],
            frac[2]
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const CU_FM3M: &str = r#"
# Copper, conventional cell
data_Cu
_cell_length_a    3.6150(2)
_cell_length_b    3.6150
_cell_length_c    3.6150
_cell_angle_alpha 90
_cell_angle_beta  90
_cell_angle_gamma 90
_symmetry_space_group_name_H-M 'F m -3 m'

loop_
_symmetry_equiv_pos_as_xyz
  'x, y, z'
  'x, y+1/2, z+1/2'
  'x+1/2, y, z+1/2'
  'x+1/2, y+1/2, z'
  '-x, -y, -z'

loop_
_atom_site_label
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
Cu1 0.0 0.0 0.0
"#;

    #[test]
    fn test_parse_with_symmetry_expansion() {
        let crystal = parse_cif_content(CU_FM3M, "x").unwrap();
        assert_eq!(crystal.name, "Cu");
        assert_eq!(crystal.len(), 4);
        assert!((crystal.lattice.volume() - 3.615f64.powi(3)).abs() < 1e-6);
    }

    #[test]
    fn test_parse_symop() {
        let (w, t) = parse_symop("-x+y, -x, z+2/3").unwrap();
        assert_eq!(w, [[-1, 1, 0], [-1, 0, 0], [0, 0, 1]]);
        assert!((t[2] - 2.0 / 3.0).abs() < 1e-12);
        assert!(parse_symop("x, y").is_none());
    }

    #[test]
    fn test_write_then_parse() {
        let lattice = Lattice::from_parameters(3.0, 3.0, 5.0, 90.0, 90.0, 120.0);
        let crystal = Crystal::from_fractional(
            "Mg",
            lattice,
            &["Mg".to_string(), "Mg".to_string()],
            &[[0.0, 0.0, 0.0], [1.0 / 3.0, 2.0 / 3.0, 0.5]],
        );
        let text = to_cif_string(&crystal);
        let parsed = parse_cif_content(&text, "x").unwrap();
        assert_eq!(parsed.len(), 2);
        let (_, _, c, _, _, gamma) = parsed.lattice.parameters();
        assert!((c - 5.0).abs() < 1e-8);
        assert!((gamma - 120.0).abs() < 1e-6);
        for (a, b) in parsed.atoms.iter().zip(&crystal.atoms) {
            for k in 0..3 {
                assert!((a.position[k] - b.position[k]).abs() < 1e-7);
            }
        }
    }

    #[test]
    fn test_missing_cell_is_parse_error() {
        let err = parse_cif_content("data_x\n_cell_length_a 3.0\n", "x").unwrap_err();
        assert!(matches!(err, CalcError::ParseError { .. }));
    }

    #[test]
    fn test_cartesian_sites() {
        let text = "data_NaCl\n_cell_length_a 5.0\n_cell_length_b 5.0\n_cell_length_c 5.0\n\
_cell_angle_alpha 90\n_cell_angle_beta 90\n_cell_angle_gamma 90\n\
loop_\n_atom_site_type_symbol\n_atom_site_Cartn_x\n_atom_site_Cartn_y\n_atom_site_Cartn_z\n\
Na 0 0 0\nCl 2.5 2.5 2.5\n";
        let crystal = parse_cif_content(text, "x").unwrap();
        assert_eq!(crystal.symbols(), vec!["Na", "Cl"]);
        assert!((crystal.atoms[1].position[1] - 2.5).abs() < 1e-10);
    }
}
