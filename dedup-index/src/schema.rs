//! Schema for the block-location index.

/// Schema version, bumped whenever the table layout changes incompatibly.
pub const SCHEMA_VERSION: i32 = 1;

pub const SCHEMA_SQL: &str = r#"
create table if not exists blobs (
    blob_id text primary key
);

create table if not exists blocks (
    strong_hash    text    not null,
    source_blob_id text    not null,
    offset         integer not null,
    rolling_hash   integer not null,
    primary key (strong_hash, source_blob_id, offset),
    foreign key (source_blob_id) references blobs(blob_id) on delete cascade
);

create index if not exists index_blocks_strong_hash on blocks(strong_hash);
create index if not exists index_blocks_rolling_hash on blocks(rolling_hash);
"#;
