//! Typed query-plan intermediate representation.
//!
//! Decision logic (which joins, which grouping columns, which metric) builds
//! a [`SelectPlan`] value; syntax generation is confined to [`SelectPlan::compile`],
//! which renders SQLite SQL with numbered `?N` placeholders and the matching
//! bind values in placeholder order. This keeps the join/grouping decisions
//! unit-testable without a database.

use crate::model::SqlValue;

/// A relation appearing in a FROM or JOIN clause.
#[derive(Clone, Debug)]
pub enum TableRef {
    Table {
        name: &'static str,
        alias: &'static str,
    },
    /// A derived table. Placeholders inside are numbered in render order, so
    /// nested parameters stay aligned with the flat bind list.
    Subquery {
        plan: Box<SelectPlan>,
        alias: &'static str,
    },
}

impl TableRef {
    pub fn table(name: &'static str, alias: &'static str) -> Self {
        Self::Table { name, alias }
    }

    pub fn subquery(plan: SelectPlan, alias: &'static str) -> Self {
        Self::Subquery {
            plan: Box::new(plan),
            alias,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Clone, Debug)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: String,
}

/// A WHERE condition with exactly one bind value. The expression holds a
/// single bare `?` which compilation rewrites to the next `?N`.
#[derive(Clone, Debug)]
pub struct Predicate {
    pub expr: &'static str,
    pub value: SqlValue,
}

impl Predicate {
    pub fn new(expr: &'static str, value: SqlValue) -> Self {
        debug_assert_eq!(expr.matches('?').count(), 1);
        Self { expr, value }
    }
}

/// One SELECT statement: decision output of the query builders.
#[derive(Clone, Debug, Default)]
pub struct SelectPlan {
    pub distinct: bool,
    pub select: Vec<String>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub predicates: Vec<Predicate>,
    pub group_by: Vec<String>,
    pub order_by: Vec<String>,
    pub limit: Option<u32>,
}

impl SelectPlan {
    pub fn from(table: TableRef) -> Self {
        Self {
            from: Some(table),
            ..Self::default()
        }
    }

    pub fn join(&mut self, kind: JoinKind, table: TableRef, on: impl Into<String>) -> &mut Self {
        self.joins.push(Join {
            kind,
            table,
            on: on.into(),
        });
        self
    }

    /// Render to `(sql, bind_values)`. Values are in `?1..?N` order.
    pub fn compile(&self) -> (String, Vec<SqlValue>) {
        let mut params = Vec::new();
        let sql = self.render(&mut params);
        (sql, params)
    }

    fn render(&self, params: &mut Vec<SqlValue>) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.select.join(", "));

        if let Some(from) = &self.from {
            sql.push_str(" FROM ");
            sql.push_str(&render_table(from, params));
        }

        for join in &self.joins {
            sql.push_str(match join.kind {
                JoinKind::Inner => " JOIN ",
                JoinKind::Left => " LEFT JOIN ",
            });
            sql.push_str(&render_table(&join.table, params));
            sql.push_str(" ON ");
            sql.push_str(&join.on);
        }

        if !self.predicates.is_empty() {
            sql.push_str(" WHERE ");
            let rendered: Vec<String> = self
                .predicates
                .iter()
                .map(|p| {
                    params.push(p.value.clone());
                    p.expr.replacen('?', &format!("?{}", params.len()), 1)
                })
                .collect();
            sql.push_str(&rendered.join(" AND "));
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        sql
    }
}

fn render_table(table: &TableRef, params: &mut Vec<SqlValue>) -> String {
    match table {
        TableRef::Table { name, alias } => format!("{name} {alias}"),
        TableRef::Subquery { plan, alias } => format!("({}) {alias}", plan.render(params)),
    }
}
