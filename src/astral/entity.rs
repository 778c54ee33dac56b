//! 天体实体：位置 + 种类（POLYanet / SOLoon / ComETH）
//!
//! 实体是不可变值对象；(位置, 种类, 属性) 三者共同决定身份，用于对账时的集合比较。

use std::fmt;
use std::str::FromStr;

/// 网格坐标（行、列均从 0 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// SOLoon 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Color {
    Blue,
    Red,
    Purple,
    White,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Blue => "blue",
            Color::Red => "red",
            Color::Purple => "purple",
            Color::White => "white",
        }
    }
}

impl FromStr for Color {
    type Err = ();

    /// 大小写不敏感
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blue" => Ok(Color::Blue),
            "red" => Ok(Color::Red),
            "purple" => Ok(Color::Purple),
            "white" => Ok(Color::White),
            _ => Err(()),
        }
    }
}

/// ComETH 方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl FromStr for Direction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(()),
        }
    }
}

/// 天体种类（封闭枚举；新增种类时所有 match 由编译器检查）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Polyanet,
    Soloon(Color),
    Cometh(Direction),
}

/// 不带属性的种类标签，用于日志与 clear-all 的候选删除顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindTag {
    Polyanet,
    Soloon,
    Cometh,
}

impl KindTag {
    /// clear-all 时逐个尝试的删除顺序
    pub const DELETE_ORDER: [KindTag; 3] = [KindTag::Polyanet, KindTag::Soloon, KindTag::Cometh];

    pub fn label(&self) -> &'static str {
        match self {
            KindTag::Polyanet => "POLYanet",
            KindTag::Soloon => "SOLoon",
            KindTag::Cometh => "ComETH",
        }
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Kind {
    pub fn tag(&self) -> KindTag {
        match self {
            Kind::Polyanet => KindTag::Polyanet,
            Kind::Soloon(_) => KindTag::Soloon,
            Kind::Cometh(_) => KindTag::Cometh,
        }
    }

    /// 目标地图格式的 token，如 `POLYANET`、`RED_SOLOON`、`UP_COMETH`
    pub fn token(&self) -> String {
        match self {
            Kind::Polyanet => "POLYANET".to_string(),
            Kind::Soloon(color) => format!("{}_SOLOON", color.as_str().to_uppercase()),
            Kind::Cometh(direction) => format!("{}_COMETH", direction.as_str().to_uppercase()),
        }
    }
}

/// 归一化后的天体：所有比较逻辑都只针对该类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    position: Position,
    kind: Kind,
}

impl Entity {
    pub fn new(position: Position, kind: Kind) -> Self {
        Self { position, kind }
    }

    pub fn polyanet(row: usize, column: usize) -> Self {
        Self::new(Position::new(row, column), Kind::Polyanet)
    }

    pub fn soloon(row: usize, column: usize, color: Color) -> Self {
        Self::new(Position::new(row, column), Kind::Soloon(color))
    }

    pub fn cometh(row: usize, column: usize, direction: Direction) -> Self {
        Self::new(Position::new(row, column), Kind::Cometh(direction))
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// 稳定的身份键 `<TOKEN>_<row>_<col>`
    pub fn key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.kind.token(),
            self.position.row,
            self.position.column
        )
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind.token(), self.position)
    }
}
