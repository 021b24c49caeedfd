use std::collections::HashMap;

/// Upper bound on stock per item.
const MAX_STOCK: u32 = 500;

pub type Sku = String;

/// A warehouse item.
#[derive(Debug, Clone)]
pub struct Item {
    pub sku: Sku,
    pub count: u32,
}

pub enum Movement {
    In(u32),
    Out(u32),
}

pub trait Ledger {
    fn record(&mut self, sku: &str, movement: Movement);
}

pub struct Inventory {
    items: HashMap<Sku, Item>,
}

impl Inventory {
    /// Empty inventory.
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    pub fn receive(&mut self, sku: &str, amount: u32) -> u32 {
        let item = self.entry(sku);
        item.count = clamp_stock(item.count + amount);
        item.count
    }

    pub fn ship(&mut self, sku: &str, amount: u32) -> Result<u32, String> {
        let item = self.entry(sku);
        if item.count < amount {
            return Err(format!("only {} of {} left", item.count, sku));
        }
        item.count -= amount;
        Ok(item.count)
    }

    fn entry(&mut self, sku: &str) -> &mut Item {
        self.items.entry(sku.to_string()).or_insert_with(|| Item {
            sku: sku.to_string(),
            count: 0,
        })
    }
}

impl Ledger for Inventory {
    fn record(&mut self, sku: &str, movement: Movement) {
        match movement {
            Movement::In(n) => {
                self.receive(sku, n);
            }
            Movement::Out(n) => {
                if let Err(e) = self.ship(sku, n) {
                    eprintln!("{e}");
                }
            }
        }
    }
}

fn clamp_stock(count: u32) -> u32 {
    count.min(MAX_STOCK)
}

fn main() {
    let mut inventory = Inventory::new();
    inventory.record("bolt", Movement::In(12));
    inventory.record("bolt", Movement::Out(3));
}
