//! Memorable output names, drawn from a fixed catalogue until it runs dry.
//!
//! A finished conversion gets a name from the catalogue that has not been
//! issued before; the used-set persists across runs in a small JSON file.
//! When every distinct name has been issued the used-set resets and reuse
//! begins. Selection among the eligible names is random, deliberately: no
//! caller may depend on a draw order.
//!
//! The pool is constructed explicitly with its state path and passed down
//! from the composition root. There is no global instance.

use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Candidate output names: cartoon and animated-character first names.
pub const CATALOG: &[&str] = &[
    // Classic Disney
    "Mickey", "Minnie", "Donald", "Daisy", "Goofy", "Pluto", "Chip", "Dale",
    "Dumbo", "Bambi", "Thumper", "Flower", "Simba", "Nala", "Mufasa", "Scar",
    "Timon", "Pumbaa", "Rafiki", "Zazu", "Ariel", "Flounder", "Sebastian",
    "Eric", "Ursula", "Belle", "Beast", "Gaston", "Lumiere", "Cogsworth",
    "Jasmine", "Aladdin", "Genie", "Jafar", "Abu", "Rajah", "Pocahontas",
    "Meeko", "Flit", "Mulan", "Mushu", "Shang", "Tarzan", "Jane", "Terk",
    "Tantor", "Lilo", "Stitch", "Nani", "Jumba", "Pleakley", "Moana", "Maui",
    "Elsa", "Anna", "Olaf", "Kristoff", "Sven", "Rapunzel", "Flynn", "Pascal",
    "Maximus", "Merida", "Elinor", "Fergus", "Vanellope", "Ralph", "Felix",
    // Pixar
    "Woody", "Buzz", "Jessie", "Rex", "Slinky", "Hamm", "Bullseye", "Lotso",
    "Forky", "Bonnie", "Andy", "Nemo", "Marlin", "Dory", "Gill", "Bloat",
    "Peach", "Jacques", "Bubbles", "Gurgle", "Nigel", "Crush", "Squirt",
    "Hank", "Destiny", "Bailey", "Sully", "Mike", "Boo", "Randall", "Roz",
    "Celia", "Lightning", "Mater", "Sally", "Doc", "Ramone", "Flo", "Luigi",
    "Guido", "Sheriff", "Fillmore", "Sarge", "Cruz", "Jackson", "Remy",
    "Linguini", "Colette", "Ego", "Emile", "Django", "Carl", "Russell",
    "Dug", "Kevin", "Muntz", "Ellie", "Joy", "Sadness", "Fear", "Anger",
    "Disgust", "Bing", "Riley", "Miguel", "Hector", "Dante", "Imelda",
    "Ernesto", "Coco", "Luca", "Alberto", "Giulia", "Ercole", "Massimo",
    // Looney Tunes
    "Bugs", "Daffy", "Porky", "Tweety", "Sylvester", "Foghorn", "Speedy",
    "Pepe", "Wile", "Roadrunner", "Taz", "Marvin", "Elmer", "Yosemite",
    "Granny", "Lola", "Gossamer", "Michigan", "Sam",
    // Hanna-Barbera
    "Scooby", "Shaggy", "Velma", "Daphne", "Fred", "Scrappy", "Yogi",
    "Booboo", "Cindy", "Ranger", "Barney", "Betty", "Wilma",
    "Pebbles", "Bamm", "Dino", "George", "Judy", "Elroy",
    "Astro", "Rosie", "Johnny", "Dexter", "Dee", "Mandark", "Blossom",
    "Buttercup", "Mojo", "Fuzzy", "Courage", "Muriel", "Eustace",
    // Nickelodeon
    "SpongeBob", "Patrick", "Squidward", "Sandy", "Krabs", "Plankton",
    "Karen", "Gary", "Pearl", "Larry", "Tommy", "Chuckie", "Angelica",
    "Phil", "Lil", "Susie", "Dil", "Kimi", "Timmy", "Cosmo", "Wanda",
    "Poof", "Sparky", "Crocker", "Vicky", "Chester", "Arnold", "Helga",
    "Gerald", "Phoebe", "Harold", "Rhonda", "Eugene", "Aang", "Katara",
    "Sokka", "Toph", "Zuko", "Iroh", "Azula", "Appa", "Momo", "Korra",
    "Mako", "Bolin", "Asami", "Tenzin", "Jinora", "Lincoln", "Lori",
    "Leni", "Luna", "Luan", "Lynn", "Lucy", "Lana", "Lisa", "Lily",
    // Cartoon Network
    "Finn", "Jake", "Marceline", "Bubblegum", "Ice", "BMO", "Lumpy",
    "Flame", "Gunter", "Mordecai", "Rigby", "Benson", "Skips", "Pops",
    "Muscle", "High", "Thomas", "Margaret", "Eileen", "Gumball", "Darwin",
    "Anais", "Nicole", "Richard", "Penny", "Carrie", "Tobias", "Steven",
    "Garnet", "Amethyst", "Peridot", "Lapis", "Jasper", "Connie",
    "Greg", "Rose", "Spinel", "Ed", "Edd", "Eddy", "Rolf", "Nazz",
    "Jimmy", "Sarah", "Jonny", "Plank", "Samurai", "Aku", "Scotsman",
    // DreamWorks
    "Shrek", "Fiona", "Donkey", "Puss", "Dragon", "Farquaad", "Charming",
    "Arthur", "Rumpel", "Po", "Tigress", "Viper", "Crane", "Mantis",
    "Monkey", "Shifu", "Oogway", "Tai", "Shen", "Kai", "Hiccup", "Toothless",
    "Astrid", "Stormfly", "Snotlout", "Fishlegs", "Ruffnut", "Tuffnut",
    "Stoick", "Valka", "Gobber", "Grimmel", "Alex", "Marty", "Melman",
    "Gloria", "King", "Maurice", "Mort", "Skipper", "Kowalski", "Rico",
    "Private", "Mason", "Vitaly", "Gia", "Stefano", "Branch",
    "Poppy", "Creek", "Bridget", "Gristle", "Guy", "Eep", "Grug", "Ugga",
    "Thunk", "Gran", "Belt", "Metro", "Roxanne", "Megamind",
    "Minion", "Tighten", "Spirit", "Rain", "Lucky",
    // Anime
    "Pikachu", "Ash", "Misty", "Brock", "Meowth",
    "James", "Oak", "Jenny", "Goku", "Vegeta", "Gohan", "Piccolo",
    "Krillin", "Bulma", "Trunks", "Goten", "Frieza", "Cell", "Buu",
    "Naruto", "Sasuke", "Sakura", "Kakashi", "Hinata", "Shikamaru",
    "Choji", "Ino", "Rock", "Neji", "Gaara", "Itachi", "Jiraiya",
    "Orochimaru", "Tsunade", "Luffy", "Zoro", "Nami", "Usopp", "Sanji",
    "Chopper", "Robin", "Franky", "Brook", "Jinbe", "Totoro", "Mei",
    "Satsuki", "Catbus", "Chihiro", "Haku", "Yubaba", "Zeniba", "Boh",
    "Kamaji", "Ponyo", "Sosuke", "Howl", "Sophie", "Calcifer", "Kiki",
    "Jiji", "Tombo", "Porco", "Gina", "Ashitaka", "San", "Moro", "Eboshi",
    "Jigo",
    // Classic animation
    "Popeye", "Olive", "Bluto", "Wimpy", "Swee", "Casper", "Wendy",
    "Bimbo", "Koko", "Richie", "Cadbury", "Droopy",
    "Spike", "Tom", "Jerry", "Nibbles", "Butch", "Quacker",
    "Tyke", "Winnie", "Chilly", "Miranda",
    "Inspector", "Brain", "Claw", "Pink", "Panther", "Clouseau",
    // Modern animation
    "Bluey", "Bingo", "Bandit", "Chilli", "Muffin", "Socks", "Stripe",
    "Trixie", "Chloe", "Judo", "Mackenzie", "Rusty", "Jack", "Honey",
    "Phineas", "Ferb", "Candace", "Perry", "Doofenshmirtz", "Vanessa",
    "Isabella", "Buford", "Baljeet", "Stacy", "Jeremy", "Monogram",
    "Norm", "Dipper", "Mabel", "Stan", "Ford", "Soos",
    "Waddles", "Bill", "Pacifica", "Gideon", "Star", "Marco", "Ludo",
    "Toffee", "Glossaryck", "Hekapoo", "Pony", "Janna", "Jackie",
    // Video games
    "Mario", "Peach", "Toad", "Yoshi", "Bowser", "Wario",
    "Waluigi", "Rosalina", "Toadette", "Birdo",
    "Diddy", "Dixie", "Cranky", "Funky", "Kirby", "Dedede", "Meta",
    "Waddle", "Link", "Zelda", "Ganondorf", "Impa", "Navi", "Epona",
    "Sonic", "Tails", "Knuckles", "Amy", "Shadow", "Rouge", "Eggman",
    "Cream", "Cheese", "Vector", "Espio", "Charmy", "Silver", "Blaze",
    "Crash", "Cortex", "Uka", "Dingodile", "Tiny",
    "Spyro", "Sparx", "Hunter", "Elora", "Moneybags", "Bianca", "Sgt",
    "Ratchet", "Clank", "Qwark", "Nefarious", "Rivet", "Kit", "Jak",
    "Daxter", "Keira", "Samos", "Torn", "Ashelin", "Rayman", "Globox",
    "Barbara", "Murfy", "Teensie", "Sackboy", "Toggle", "Oddsock",
    // Assorted
    "Groot", "Rocket", "Drax", "Gamora", "Nebula", "Starlord",
    "Baymax", "Hiro", "Wasabi", "Gogo", "Tadashi",
    "Callaghan", "Wall", "Eve", "Mo", "Auto", "Captain", "McCrea",
    "Flint", "Steve", "Brent", "Earl", "Tim",
    "Barb", "Gil", "Manny", "Sid", "Diego", "Scrat", "Peaches",
    "Eddie", "Buck", "Shira", "Brooke", "Julian",
    "Horton", "Morton", "Vlad", "Katie", "Ted", "Audrey", "Grammy",
    "Lorax", "Once", "Ferdinand", "Lupe", "Bones", "Angus", "Una",
    "Dos", "Cuatro", "Valiente", "Guapo", "Paco", "Gru",
    "Margo", "Edith", "Agnes", "Nefario", "Wild", "Scarlet",
    "Herb", "Balthazar", "Dru", "Fritz", "Bob", "Stuart",
    "Otto", "Paddington", "Brown", "Bird", "Curry", "Gruber", "Bucket",
    "Phoenix", "Nick", "Bogo", "Clawhauser",
    "Bellwether", "Lionheart", "Finnick", "Flash", "Yax", "Gazelle",
    // More characters
    "Archer", "Cyril", "Pam", "Cheryl", "Krieger", "Malory",
    "Ray", "Woodhouse", "Barry", "Katya", "Conway", "Brett", "Figgis",
    "Rick", "Morty", "Beth", "Summer", "Birdperson", "Squanchy",
    "Unity", "Tammy", "Scary", "Terry", "Goldenfold",
    "Poopybutthole", "Jaguar", "Pickle", "Noob", "Evil", "Snuffles",
    "BoJack", "Diane", "Todd", "Carolyn", "Peanutbutter", "Hollyhock",
    "Beatrice", "Butterscotch", "Charlotte", "Kelsey", "Rutabaga",
    "Judah", "Pickles", "Paige", "Tuca", "Bertie", "Speckle", "Kara",
    "Figgy", "Dapper", "Hilda", "Twig", "Alfur", "Frida", "David",
    "Johanna", "Raven", "Kaisa", "Erik", "Victoria", "Gerda", "Cedric",
    "Edmund",
    // Filling out the pool
    "Alvin", "Simon", "Theodore", "Brittany", "Jeanette", "Eleanor",
    "Dave", "Ian", "Zoe", "Toby", "Julie", "Miles", "Samantha", "Ashley",
    "Rocko", "Heffer", "Filburt", "Spunky", "Bev", "Virginia",
    "Paula", "Peter", "Widget", "Wubbzy", "Walden",
    "Daizy", "Huggy", "Moxy", "Nox", "Ox", "Ug", "Mandy", "Ugly",
    "Charlie", "Itchy", "Killer", "Carface", "Annabelle", "Belladonna",
    "Webster", "Cuddles", "Giggles", "Toothy", "Petunia",
    "Handy", "Nutty", "Sniffles", "Pop", "Cub", "Flaky", "Mime", "Disco",
    "Lifty", "Shifty", "Cro", "Splendid", "Lammy", "Truffles",
    "Beavis", "Butthead", "Daria", "Trent", "Quinn", "Helen",
    "Mack", "Jodie", "Andrea", "Sandi",
    "Tiffany", "Upchuck", "Jesse", "Wind",
    "Catra", "Adora", "Glimmer", "Bow", "Hordak", "Entrapta", "Scorpia",
    "Mermista", "Perfuma", "Frosta", "Spinnerella", "Netossa", "Swift",
    "Seahawk", "Horde", "Double", "Kyle", "Rogelio", "Lonnie",
    "Angella", "Micah", "Castaspella", "Light", "Hope", "Mara", "Razz",
    "Madame", "Huntara", "Tung", "Flutterina", "Peekablue", "Sweet",
    "Tallstar", "Jewelstar", "Starla", "Swen", "Imp", "Grizzlor",
    "Leech", "Mantenna", "Modulok", "Squidish", "Multi", "Octavia",
    "Wrong", "Emily", "Sparkles", "Thundercat", "Lion", "Cheetara",
    "Tygra", "Panthro", "Snarf", "Wilykit", "Wilykat", "Jaga", "Bengali",
    "Pumyra", "Lynxo", "Mumm", "Slithe", "Jackalman", "Monkian",
    "Vultureman", "Rataro", "Grune", "Kaynar", "Addicus", "Ssslithe",
    "Claudus", "Voltron", "Keith", "Lance", "Pidge", "Hunk", "Shiro",
    "Allura", "Coran", "Lotor", "Zarkon", "Haggar", "Sendak", "Acxa",
    "Ezor", "Zethrid", "Narti", "Romelle", "Kolivan", "Ulaz", "Thace",
    "Regris", "Krolia", "Veronica", "Nadia", "Ryan", "Kinkade",
    "Leifsdottir", "Griffin", "Iverson", "Sanda", "Slav", "Matt",
    "Commander", "Dayak", "Ladnok", "Branko", "Morvok", "Varkon", "Lahn",
    "Honerva", "Sincline", "Bandor", "Kova", "Cupcake", "Cherry",
];

static DISTINCT: Lazy<HashSet<&'static str>> = Lazy::new(|| CATALOG.iter().copied().collect());

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsedNames {
    used: Vec<String>,
}

/// The name pool: catalogue plus persisted used-set.
#[derive(Debug)]
pub struct NamePool {
    path: PathBuf,
    used: Mutex<HashSet<String>>,
}

impl NamePool {
    /// Load the pool from `path`. A missing or corrupt state file is treated
    /// as an empty used-set, never an error.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let used = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<UsedNames>(&bytes) {
                // Names that are no longer in the catalogue are dropped so the
                // used-set can never outgrow it.
                Ok(state) => state
                    .used
                    .into_iter()
                    .filter(|name| DISTINCT.contains(name.as_str()))
                    .collect(),
                Err(e) => {
                    warn!("used-names state unreadable, starting empty: {e}");
                    HashSet::new()
                }
            },
            Err(_) => HashSet::new(),
        };
        Self {
            path,
            used: Mutex::new(used),
        }
    }

    /// Draw a random name that has not been issued yet.
    ///
    /// When the distinct catalogue is exhausted the used-set resets first,
    /// so the draw always succeeds.
    pub fn next_name(&self) -> String {
        let mut used = self.used.lock().expect("name pool poisoned");

        let mut eligible: Vec<&str> = DISTINCT
            .iter()
            .copied()
            .filter(|name| !used.contains(*name))
            .collect();
        if eligible.is_empty() {
            debug!("name catalogue exhausted, resetting used-set");
            used.clear();
            eligible = DISTINCT.iter().copied().collect();
        }

        let name = eligible
            .choose(&mut rand::rng())
            .expect("catalogue is non-empty")
            .to_string();
        used.insert(name.clone());
        self.save(&used);
        name
    }

    /// Return `name` to the pool, making it eligible again immediately.
    pub fn release(&self, name: &str) {
        let mut used = self.used.lock().expect("name pool poisoned");
        if used.remove(name) {
            self.save(&used);
        }
    }

    /// How many distinct names remain unissued.
    pub fn available(&self) -> usize {
        let used = self.used.lock().expect("name pool poisoned");
        DISTINCT.len() - used.len()
    }

    /// Number of distinct names in the catalogue.
    pub fn catalogue_len() -> usize {
        DISTINCT.len()
    }

    fn save(&self, used: &HashSet<String>) {
        let state = UsedNames {
            used: used.iter().cloned().collect(),
        };
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_vec(&state) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&self.path, bytes) {
                    warn!("could not persist used names: {e}");
                }
            }
            Err(e) => warn!("could not serialise used names: {e}"),
        }
    }
}
