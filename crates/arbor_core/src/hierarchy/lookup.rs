//! Name and path lookup.
//!
//! Nothing found is [`EntityId::NULL`], never an error: a malformed path is
//! just a path that names nobody.

use crate::storage::{EntityId, Name, StageContext, Table, TableData, Type, World};

impl World {
    /// Child of `parent` named `name`, or null.
    ///
    /// Scans the tables registered under `parent`. A staged context reads the
    /// stage's live overlay rows first, then the committed rows it does not
    /// shadow. Tables the stage created are not registered yet, so a staged
    /// miss also scans every overlay whose table sits under `parent`.
    #[must_use]
    pub fn lookup_child(&self, ctx: StageContext<'_>, parent: EntityId, name: &str) -> EntityId {
        // A name nobody ever interned cannot match.
        let Some(symbol) = self.names().get(name) else {
            return EntityId::NULL;
        };

        for &id in self.hierarchy().tables(parent) {
            let Some(table) = self.table(ctx, id) else {
                continue;
            };
            if !table.has_name() {
                continue;
            }
            let found = find_in_table(self, ctx, table, symbol);
            if !found.is_null() {
                return found;
            }
        }

        let StageContext::Staged(stage) = ctx else {
            return EntityId::NULL;
        };
        tracing::trace!(
            "Stage {}: {:?} not under {} in the index, scanning overlays",
            stage.id(),
            name,
            parent
        );
        for (id, overlay) in stage.overlays() {
            let Some(table) = self.table(ctx, id) else {
                continue;
            };
            if !table.has_name() || table.parent() != parent {
                continue;
            }
            let found = scan(table, overlay, symbol, |row, entity| {
                stage.is_live_slot(id, row, entity)
            });
            if !found.is_null() {
                return found;
            }
        }
        EntityId::NULL
    }

    /// Top-level lookup. A name starting with a digit is read as a numeric
    /// entity id and returned if that entity is alive in the view.
    #[must_use]
    pub fn lookup(&self, ctx: StageContext<'_>, name: &str) -> EntityId {
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            let digits = name.bytes().take_while(u8::is_ascii_digit).count();
            let entity = name[..digits]
                .parse()
                .map_or(EntityId::NULL, EntityId::from_raw);
            return if self.is_alive(ctx, entity) {
                entity
            } else {
                EntityId::NULL
            };
        }
        self.lookup_child(ctx, EntityId::NULL, name)
    }

    /// Resolves `path` one segment at a time, starting from `root`.
    ///
    /// A path starting with `prefix` is absolute: resolution starts from the
    /// top level instead. An empty path names `root`; a trailing separator is
    /// ignored; an empty segment anywhere else matches nothing.
    #[must_use]
    pub fn lookup_path(
        &self,
        ctx: StageContext<'_>,
        root: EntityId,
        path: &str,
        sep: &str,
        prefix: Option<&str>,
    ) -> EntityId {
        let mut cur = root;
        let mut rest = path;
        if let Some(stripped) = prefix.and_then(|prefix| path.strip_prefix(prefix)) {
            rest = stripped;
            cur = EntityId::NULL;
        }

        if sep.is_empty() {
            return if rest.is_empty() {
                cur
            } else {
                self.lookup_child(ctx, cur, rest)
            };
        }

        let mut segments = rest.split(sep).peekable();
        while let Some(segment) = segments.next() {
            if segment.is_empty() && segments.peek().is_none() {
                break;
            }
            cur = self.lookup_child(ctx, cur, segment);
            if cur.is_null() {
                return EntityId::NULL;
            }
        }
        cur
    }

    /// [`lookup_path`](Self::lookup_path) with the configured separator and
    /// prefix.
    #[must_use]
    pub fn lookup_path_default(&self, ctx: StageContext<'_>, root: EntityId, path: &str) -> EntityId {
        let config = self.config();
        self.lookup_path(ctx, root, path, &config.path_separator, config.path_prefix.as_deref())
    }

    /// Parent of the entity in the view, or null.
    #[must_use]
    pub fn parent(&self, ctx: StageContext<'_>, entity: EntityId) -> EntityId {
        self.type_of(ctx, entity)
            .map_or(EntityId::NULL, Type::parent)
    }
}

fn find_in_table(world: &World, ctx: StageContext<'_>, table: &Table, symbol: Name) -> EntityId {
    let Some(data) = world.staged_view(ctx, table.id()) else {
        return EntityId::NULL;
    };
    let StageContext::Staged(stage) = ctx else {
        return scan(table, data, symbol, |_, _| true);
    };
    if !std::ptr::eq(data, table.main()) {
        let found = scan(table, data, symbol, |row, entity| {
            stage.is_live_slot(table.id(), row, entity)
        });
        if !found.is_null() {
            return found;
        }
    }
    // Committed rows the stage has not moved or deleted.
    scan(table, table.main(), symbol, |_, entity| !stage.shadows(entity))
}

fn scan(
    table: &Table,
    data: &TableData,
    symbol: Name,
    live: impl Fn(usize, EntityId) -> bool,
) -> EntityId {
    let Some(names) = table.names(data) else {
        return EntityId::NULL;
    };
    names
        .iter()
        .zip(data.entities())
        .enumerate()
        .find(|(row, (name, entity))| **name == symbol && live(*row, **entity))
        .map_or(EntityId::NULL, |(_, (_, entity))| *entity)
}
