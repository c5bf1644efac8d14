//! SQL text shared by the relational backends.

/// Parameter marker syntax of the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placeholders {
    /// `?` (SQLite)
    Question,
    /// `$1`, `$2`, ... (PostgreSQL)
    Numbered,
}

impl Placeholders {
    fn nth(self, n: usize) -> String {
        match self {
            Self::Question => "?".to_string(),
            Self::Numbered => format!("${n}"),
        }
    }
}

/// Statements for one validated table.
#[derive(Debug, Clone)]
pub(crate) struct Statements {
    pub create_table: String,
    /// Binds: name.
    pub select: String,
    /// Binds: name, owner, until, now.
    pub upsert: String,
    /// Binds: name.
    pub delete: String,
    /// Binds: name, owner.
    pub delete_owned: String,
}

impl Statements {
    pub(crate) fn new(table: &str, until_type: &str, p: Placeholders) -> Self {
        let create_table = format!(
            r#"CREATE TABLE IF NOT EXISTS "{table}" (
                "name" TEXT PRIMARY KEY NOT NULL,
                "owner" TEXT NOT NULL,
                "until" {until_type} NOT NULL
            )"#
        );

        let select = format!(
            r#"SELECT "owner", "until" FROM "{table}" WHERE "name" = {}"#,
            p.nth(1)
        );

        // The row is replaced only when it is free (empty owner or expired) or
        // already ours; otherwise zero rows change.
        let upsert = format!(
            r#"INSERT INTO "{table}" ("name", "owner", "until") VALUES ({}, {}, {})
            ON CONFLICT ("name") DO UPDATE SET "owner" = excluded."owner", "until" = excluded."until"
            WHERE "{table}"."owner" = excluded."owner"
               OR "{table}"."owner" = ''
               OR "{table}"."until" <= {}"#,
            p.nth(1),
            p.nth(2),
            p.nth(3),
            p.nth(4)
        );

        let delete = format!(r#"DELETE FROM "{table}" WHERE "name" = {}"#, p.nth(1));
        let delete_owned = format!(
            r#"DELETE FROM "{table}" WHERE "name" = {} AND "owner" = {}"#,
            p.nth(1),
            p.nth(2)
        );

        Self {
            create_table,
            select,
            upsert,
            delete,
            delete_owned,
        }
    }
}
