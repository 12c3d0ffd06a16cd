use std::collections::HashMap;

use crate::bytecode::symbol::Symbol;
use crate::bytecode::symbol_scope::SymbolScope;

/// Lexically scoped symbol table.
///
/// Two kinds of scope share one type: function scopes (`block == false`)
/// own a dense index space for their locals, and block scopes
/// (`block == true`) continue the enclosing function's numbering. Every
/// definition takes a fresh index counted at the owning function (or the
/// root, for globals), so each binding owns its frame slot for the whole
/// call; names may still be reused across sibling blocks.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    parent: Option<Box<SymbolTable>>,
    block: bool,
    store: HashMap<String, Symbol>,
    num_definition: usize,
    free_symbols: Vec<Symbol>,
    builtin_symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a child scope; `block` keeps the current index space.
    pub fn fork(self, block: bool) -> SymbolTable {
        SymbolTable {
            parent: Some(Box::new(self)),
            block,
            ..SymbolTable::default()
        }
    }

    /// Closes the current scope. Index accounting already lives at the
    /// owning function table, so popping a block loses only its names.
    pub fn unfork(mut self) -> SymbolTable {
        *self.parent.take().expect("unfork at root scope")
    }

    fn next_index(&self) -> usize {
        if self.block {
            self.parent.as_ref().map_or(0, |p| p.next_index()) + self.num_definition
        } else {
            self.num_definition
        }
    }

    fn root_mut(&mut self) -> &mut SymbolTable {
        if self.parent.is_some() {
            self.parent.as_mut().unwrap().root_mut()
        } else {
            self
        }
    }

    /// The table that owns this scope's index space: the nearest non-block
    /// ancestor (or self).
    fn owner_mut(&mut self) -> &mut SymbolTable {
        if self.block {
            self.parent.as_mut().expect("block without parent").owner_mut()
        } else {
            self
        }
    }

    fn in_global_scope(&self) -> bool {
        let mut table = self;
        while table.block {
            match &table.parent {
                Some(parent) => table = parent,
                None => return true,
            }
        }
        table.parent.is_none()
    }

    /// Defines a name in the current scope with the next dense index.
    /// Redeclaration checks are the compiler's job via [`Self::resolve`].
    pub fn define(&mut self, name: impl Into<String>) -> Symbol {
        let name = name.into();
        let index = self.next_index();
        let scope = if self.in_global_scope() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        if self.block {
            // The owning table carries the counter so indices stay
            // monotonic across sibling blocks and no frame slot is shared
            // between distinct bindings.
            self.owner_mut().num_definition += 1;
        } else {
            self.num_definition += 1;
        }
        let symbol = Symbol::new(name.clone(), scope, index);
        self.store.insert(name, symbol.clone());
        symbol
    }

    /// Registers a host builtin at a caller-chosen index, visible from every
    /// scope.
    pub fn define_builtin(&mut self, index: usize, name: impl Into<String>) -> Symbol {
        let name = name.into();
        let root = self.root_mut();
        let symbol = Symbol::new(name.clone(), SymbolScope::Builtin, index);
        root.store.insert(name, symbol.clone());
        root.builtin_symbols.push(symbol.clone());
        symbol
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        self.free_symbols.push(original.clone());
        let mut symbol = Symbol::new(original.name.clone(), SymbolScope::Free, self.free_symbols.len() - 1);
        symbol.local_assigned = original.local_assigned;
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// Resolves the nearest visible symbol. The returned depth counts scope
    /// hops; depth zero means the innermost scope. Resolving a local or free
    /// across a function boundary materialises a Free in every intervening
    /// function scope.
    pub fn resolve(&mut self, name: &str, recur: bool) -> Option<(Symbol, usize)> {
        if let Some(symbol) = self.store.get(name) {
            if symbol.scope != SymbolScope::Local || symbol.local_assigned || recur {
                return Some((symbol.clone(), 0));
            }
        }
        let parent = self.parent.as_mut()?;
        let (mut symbol, depth) = parent.resolve(name, true)?;
        let depth = depth + 1;
        if !self.block
            && symbol.scope != SymbolScope::Global
            && symbol.scope != SymbolScope::Builtin
        {
            symbol = self.define_free(symbol);
        }
        Some((symbol, depth))
    }

    /// True when the name is already taken in the innermost scope; used for
    /// redeclaration checks, which must not disturb capture analysis the
    /// way a full resolve would.
    pub fn exists_in_current_scope(&self, name: &str) -> bool {
        self.store.contains_key(name)
    }

    /// Marks a local as assigned so later references in the same scope
    /// resolve to it.
    pub fn mark_assigned(&mut self, name: &str) {
        if let Some(symbol) = self.store.get_mut(name) {
            symbol.local_assigned = true;
        }
    }

    /// Total definitions counted at this scope; indices are never reused,
    /// so this is the high-water mark that sizes the globals array and the
    /// frame's local slots.
    pub fn max_symbols(&self) -> usize {
        self.num_definition
    }

    pub fn free_symbols(&self) -> &[Symbol] {
        &self.free_symbols
    }

    pub fn builtin_symbols(&self) -> Vec<Symbol> {
        let mut table = self;
        while let Some(parent) = &table.parent {
            table = parent;
        }
        table.builtin_symbols.clone()
    }

    /// Names defined directly in this scope.
    pub fn names(&self) -> Vec<String> {
        self.store.keys().cloned().collect()
    }
}
