//! Build script keeping embedded migrations fresh.
//!
//! `embed_migrations!` bakes the migration files into the binary at compile
//! time, but Cargo does not watch those files on its own. Emitting a
//! `rerun-if-changed` directive makes incremental builds notice new or
//! edited migrations.

fn main() {
    println!("cargo:rerun-if-changed=migrations");
}
