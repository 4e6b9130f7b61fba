use crate::error::{Error, Result};

/// A coordinate field: either a direct column reference or a ratio of two
/// columns written as "num/den". Parsed once before any batch is processed;
/// the x and y expressions are parsed and evaluated independently of each
/// other, so a ratio on one axis never constrains the other.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldExpr {
    Column(String),
    Ratio { num: String, den: String },
}

impl FieldExpr {
    pub fn parse(s: &str) -> Self {
        match s.find('/') {
            Some(pos) => FieldExpr::Ratio {
                num: s[..pos].to_string(),
                den: s[pos + 1..].to_string(),
            },
            None => FieldExpr::Column(s.to_string()),
        }
    }

    /// Display name, as it appears in the descriptor's encoding blocks.
    pub fn name(&self) -> String {
        match self {
            FieldExpr::Column(c) => c.clone(),
            FieldExpr::Ratio { num, den } => format!("{}/{}", num, den),
        }
    }

    /// Source columns this expression reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            FieldExpr::Column(c) => vec![c],
            FieldExpr::Ratio { num, den } => vec![num, den],
        }
    }

    /// Bind the expression to a concrete header row.
    pub fn resolve(&self, headers: &[String]) -> Result<FieldPlan> {
        match self {
            FieldExpr::Column(c) => Ok(FieldPlan::Column(find_col_index(headers, c)?)),
            FieldExpr::Ratio { num, den } => Ok(FieldPlan::Ratio(
                find_col_index(headers, num)?,
                find_col_index(headers, den)?,
            )),
        }
    }
}

/// A field expression resolved to column indices of one batch schema.
#[derive(Debug, Clone, Copy)]
pub enum FieldPlan {
    Column(usize),
    Ratio(usize, usize),
}

impl FieldPlan {
    /// Evaluate against one row. A zero denominator yields an infinity,
    /// which falls outside any finite bounding box and is excluded by the
    /// binning stage.
    pub fn eval(&self, row: &[String], expr: &FieldExpr, row_idx: usize) -> Result<f64> {
        match self {
            FieldPlan::Column(i) => parse_cell(row, *i, expr, row_idx),
            FieldPlan::Ratio(n, d) => {
                let num = parse_cell(row, *n, expr, row_idx)?;
                let den = parse_cell(row, *d, expr, row_idx)?;
                Ok(num / den)
            }
        }
    }
}

fn parse_cell(row: &[String], idx: usize, expr: &FieldExpr, row_idx: usize) -> Result<f64> {
    let cell = &row[idx];
    cell.parse::<f64>().map_err(|_| Error::BadNumber {
        value: cell.clone(),
        column: expr.name(),
        row: row_idx + 1,
    })
}

pub fn find_col_index(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::MissingColumn {
            name: name.to_string(),
        })
}
