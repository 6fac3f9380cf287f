#![forbid(unsafe_code)]

mod core;
mod indexes;
mod mappings;
mod ops_log;
mod snapshots;

pub(super) fn full_schema_sql() -> String {
    let mut sql = String::new();
    sql.push_str(core::SQL);
    sql.push_str(mappings::SQL);
    sql.push_str(snapshots::SQL);
    sql.push_str(ops_log::SQL);
    sql.push_str(indexes::SQL);
    sql
}
