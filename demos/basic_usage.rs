//! Basic usage example for deferred-registry.
//!
//! Demonstrates:
//! - Declaring entries with builders and getting handles back immediately
//! - Running the registration pass that constructs them
//! - Looking up siblings (same name, other category)
//! - Attaching lang and tag data and generating it afterwards
//!
//! Run with: `cargo run --example basic_usage`

use deferred_registry::{
    BuildError, Builder, BuilderBase, Category, ProviderType, Registrate, TagsProvider, LANG,
};

struct Block;
struct Item;

const TAGS: ProviderType<TagsProvider> = ProviderType::new("tags");

#[derive(Debug)]
struct Lamp {
    light_level: u8,
}

/// A builder with its own configuration, as content code would write it.
struct LampBuilder {
    base: BuilderBase<Lamp, ()>,
    light_level: Option<u8>,
}

impl LampBuilder {
    fn new(host: &Registrate, name: &str) -> Self {
        Self {
            base: BuilderBase::new(host.clone(), (), name, Category::of::<Block>()),
            light_level: None,
        }
    }

    fn light_level(mut self, light_level: u8) -> Self {
        self.light_level = Some(light_level);
        self
    }
}

impl Builder for LampBuilder {
    type Entry = Lamp;
    type Parent = ();

    fn base(&self) -> &BuilderBase<Lamp, ()> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BuilderBase<Lamp, ()> {
        &mut self.base
    }

    fn create_entry(&self) -> Result<Lamp, BuildError> {
        let light_level = self.light_level.ok_or(BuildError::Missing {
            field: "light_level",
        })?;
        if light_level > 15 {
            return Err(BuildError::Invalid {
                reason: format!("light level {light_level} is above 15"),
            });
        }
        Ok(Lamp { light_level })
    }
}

fn main() {
    println!("=== deferred-registry: Basic Usage ===\n");

    let host = Registrate::new("demo");

    // -------------------------------------------------------------------------
    // 1. Declare entries
    // -------------------------------------------------------------------------
    println!("1. Declaring entries...");

    let lamp = LampBuilder::new(&host, "glow_lamp")
        .light_level(15)
        .lang(|_| "block.demo.glow_lamp".to_string())
        .tag(TAGS, "lights")
        .register()
        .unwrap();

    let lamp_item = host
        .simple((), "glow_lamp", Category::of::<Item>(), || Ok("lamp item".to_string()))
        .lang_with_name(|_| "item.demo.glow_lamp".to_string(), "Lamp (item)")
        .register()
        .unwrap();

    println!("   Declared: {:?}", lamp);
    println!("   Declared: {:?}", lamp_item);
    println!("   Pending:  {}", host.pending_count());

    // -------------------------------------------------------------------------
    // 2. Handles do not resolve before the registration pass
    // -------------------------------------------------------------------------
    println!("\n2. Reading before registration...");

    match lamp.get() {
        Ok(value) => println!("   Found lamp: {:?}", value),
        Err(e) => println!("   Error (expected): {}", e),
    }

    // -------------------------------------------------------------------------
    // 3. Run the registration pass
    // -------------------------------------------------------------------------
    println!("\n3. Running the registration pass...");

    let constructed = host.run_registration().unwrap();
    println!("   Constructed {} entries", constructed);
    println!("   Lamp light level: {}", lamp.get().unwrap().light_level);

    // -------------------------------------------------------------------------
    // 4. Siblings
    // -------------------------------------------------------------------------
    println!("\n4. Looking up siblings...");

    let sibling = lamp.get_sibling::<String>(Category::of::<Item>());
    println!("   Item sibling of the lamp: {}", sibling.get().unwrap());
    println!("   Same handle as declared:  {}", sibling == lamp_item);

    // -------------------------------------------------------------------------
    // 5. Generate side data
    // -------------------------------------------------------------------------
    println!("\n5. Generating side data...");

    let mut lang = host.lang_provider();
    host.generate(LANG, &mut lang).unwrap();
    for (key, value) in lang.entries() {
        println!("   {} = {}", key, value);
    }

    let mut tags = TagsProvider::new();
    host.generate(TAGS, &mut tags).unwrap();
    println!("   lights: {:?}", tags.members("lights"));

    // -------------------------------------------------------------------------
    // Summary
    // -------------------------------------------------------------------------
    println!("\n=== Example Complete ===");
    println!("{:?}", host);
}
