fn main() {
    std::process::exit(hardlinkable::run());
}
