use kurbo::{Point, Vec2};

use crate::{normalize_color, Arg, Batcher, Command, Defaults, TurtleError, MAX_SPEED};

/// Wraps an angle in degrees into `[0, 360)`.
pub fn normalize_heading(degrees: f64) -> f64 {
    let h = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs; adding zero also gets
    // rid of negative zero.
    if h >= 360.0 {
        0.0
    } else {
        h + 0.0
    }
}

/// Everything there is to know about one turtle.
///
/// Heading is in degrees, counter-clockwise from the positive x-axis.
#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    pub pos: Point,
    pub heading: f64,
    pub pen_down: bool,
    pub pen_color: String,
    pub pen_size: f64,
    pub speed: u8,
    pub visible: bool,
}

impl Pose {
    pub fn new(defaults: &Defaults) -> Pose {
        Pose {
            pos: Point::ORIGIN,
            heading: 0.0,
            pen_down: true,
            pen_color: defaults.pen_color.clone(),
            pen_size: defaults.pen_size,
            speed: defaults.speed.min(MAX_SPEED),
            visible: true,
        }
    }

    fn direction(&self) -> Vec2 {
        Vec2::from_angle(self.heading.to_radians())
    }

    fn broadcast(&self) -> Command {
        Command::TurtlePose {
            x: self.pos.x,
            y: self.pos.y,
            heading: self.heading,
            visible: self.visible,
            color: self.pen_color.clone(),
        }
    }
}

/// A turtle without anywhere to draw. See [`TurtleRef`] for the operations.
#[derive(Clone, Debug, PartialEq)]
pub struct Turtle {
    pose: Pose,
}

impl Turtle {
    /// Creates a turtle in its default pose, announcing it to `out` even if `out` is buffering.
    pub fn new(defaults: &Defaults, out: &mut Batcher) -> Turtle {
        let turtle = Turtle {
            pose: Pose::new(defaults),
        };
        out.signal(turtle.pose.broadcast());
        turtle
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Pairs this turtle with the batcher its commands should go to.
    pub fn on<'a>(&'a mut self, out: &'a mut Batcher) -> TurtleRef<'a> {
        TurtleRef { turtle: self, out }
    }
}

/// A turtle that is ready to draw.
pub struct TurtleRef<'a> {
    turtle: &'a mut Turtle,
    out: &'a mut Batcher,
}

impl<'a> TurtleRef<'a> {
    pub fn pose(&self) -> &Pose {
        &self.turtle.pose
    }

    fn pose_mut(&mut self) -> &mut Pose {
        &mut self.turtle.pose
    }

    fn broadcast(&mut self) {
        let cmd = self.turtle.pose.broadcast();
        self.out.emit(cmd);
    }

    /// Moves in a straight line, drawing if the pen is down.
    fn travel_to(&mut self, target: Point) {
        let pose = &self.turtle.pose;
        if pose.pen_down {
            self.out.emit(Command::Line {
                x1: pose.pos.x,
                y1: pose.pos.y,
                x2: target.x,
                y2: target.y,
                color: pose.pen_color.clone(),
                width: pose.pen_size,
                speed: pose.speed,
            });
        }
        self.pose_mut().pos = target;
        self.broadcast();
    }

    pub fn forward(&mut self, dist: f64) {
        let pose = self.pose();
        let target = pose.pos + pose.direction() * dist;
        self.travel_to(target);
    }

    pub fn backward(&mut self, dist: f64) {
        self.forward(-dist);
    }

    pub fn left(&mut self, degrees: f64) {
        let heading = self.pose().heading + degrees;
        self.setheading(heading);
    }

    pub fn right(&mut self, degrees: f64) {
        self.left(-degrees);
    }

    pub fn goto(&mut self, x: f64, y: f64) {
        self.travel_to(Point::new(x, y));
    }

    pub fn setheading(&mut self, degrees: f64) {
        self.pose_mut().heading = normalize_heading(degrees);
        self.broadcast();
    }

    pub fn home(&mut self) {
        self.goto(0.0, 0.0);
        self.setheading(0.0);
    }

    pub fn penup(&mut self) {
        self.pose_mut().pen_down = false;
    }

    pub fn pendown(&mut self) {
        self.pose_mut().pen_down = true;
    }

    /// With no arguments, returns the pen color. Otherwise sets it (see [`normalize_color`]).
    pub fn color(&mut self, args: &[Arg]) -> Result<Option<String>, TurtleError> {
        if args.is_empty() {
            return Ok(Some(self.pose().pen_color.clone()));
        }
        let color = normalize_color(args)?;
        self.pose_mut().pen_color = color;
        self.broadcast();
        Ok(None)
    }

    pub fn pencolor(&mut self, value: Option<Arg>) -> Result<Option<String>, TurtleError> {
        match value {
            Some(arg) => self.color(&[arg]),
            None => self.color(&[]),
        }
    }

    /// With no argument, returns the pen size. Otherwise sets it; only future lines notice.
    pub fn pensize(&mut self, value: Option<f64>) -> Result<Option<f64>, TurtleError> {
        let Some(size) = value else {
            return Ok(Some(self.pose().pen_size));
        };
        if !size.is_finite() || size <= 0.0 {
            return Err(TurtleError::invalid(
                "pensize",
                format!("{size} is not a positive number"),
            ));
        }
        self.pose_mut().pen_size = size;
        Ok(None)
    }

    /// With no argument, returns the speed. Otherwise sets it, clamped to `0..=10`.
    ///
    /// Anything that isn't a whole number is quietly ignored.
    pub fn speed(&mut self, value: Option<&Arg>) -> Option<u8> {
        let Some(arg) = value else {
            return Some(self.pose().speed);
        };
        match arg.as_int() {
            Some(s) => self.pose_mut().speed = s.clamp(0, MAX_SPEED as i64) as u8,
            None => log::debug!("ignoring speed {arg}"),
        }
        None
    }

    pub fn hideturtle(&mut self) {
        self.pose_mut().visible = false;
        self.broadcast();
    }

    pub fn showturtle(&mut self) {
        self.pose_mut().visible = true;
        self.broadcast();
    }

    /// Wipes the canvas, but leaves the turtle alone.
    pub fn clear(&mut self) {
        self.out.emit(Command::Clear);
        self.broadcast();
    }

    pub fn bgcolor(&mut self, color: String) {
        self.out.emit(Command::Background { color });
        self.broadcast();
    }

    pub fn position(&self) -> Point {
        self.pose().pos
    }

    pub fn xcor(&self) -> f64 {
        self.pose().pos.x
    }

    pub fn ycor(&self) -> f64 {
        self.pose().pos.y
    }

    pub fn heading(&self) -> f64 {
        self.pose().heading
    }

    pub fn isdown(&self) -> bool {
        self.pose().pen_down
    }

    pub fn isvisible(&self) -> bool {
        self.pose().visible
    }
}
