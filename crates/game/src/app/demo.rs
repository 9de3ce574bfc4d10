use platformer_engine::{
    Actor, ActorBody, ActorContext, ActorRegistry, ActorSpawn, ActorStatus, TileActor,
};

/// Built-in level used when no map file is configured.
pub(crate) const DEMO_MAP: &str = include_str!("../../../../assets/maps/demo.json");
pub(crate) const DEMO_MAP_ORIGIN: &str = "builtin:demo";

const FALL_SPEED: i32 = 2;

/// Walks along the floor, turns around at walls and falls off ledges.
#[derive(Debug)]
pub(crate) struct Walker {
    body: ActorBody,
    direction: i32,
}

impl Walker {
    pub(crate) fn spawn(spawn: &ActorSpawn) -> Box<dyn Actor> {
        let direction = if spawn.properties.get("facing") == Some("left") {
            -1
        } else {
            1
        };
        Box::new(Self {
            body: ActorBody::from_spawn(spawn),
            direction,
        })
    }
}

impl Actor for Walker {
    fn body(&self) -> &ActorBody {
        &self.body
    }

    fn body_mut(&mut self) -> &mut ActorBody {
        &mut self.body
    }

    fn update(&mut self, ctx: &mut ActorContext<'_>) -> ActorStatus {
        if !self.is_active() {
            return ActorStatus::Remove;
        }

        let rect = self.collision_rect();
        let below = rect.translate(0, 1);
        if !ctx.is_blocked(&below) {
            let fall = (1..=FALL_SPEED)
                .take_while(|dy| !ctx.is_blocked(&rect.translate(0, *dy)))
                .last()
                .unwrap_or(0);
            self.move_by(0, fall);
        } else {
            let ahead = rect.translate(self.direction, 0);
            if ctx.is_blocked(&ahead) {
                self.direction = -self.direction;
            } else {
                self.move_by(self.direction, 0);
            }
        }

        let rect = self.collision_rect();
        ctx.check_triggers(&rect);
        ActorStatus::Alive
    }
}

pub(crate) fn demo_registry() -> ActorRegistry {
    let mut registry = ActorRegistry::new();
    registry
        .register("walker", Walker::spawn)
        .register("block", TileActor::spawn);
    registry
}
