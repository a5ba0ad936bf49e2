// SPDX-License-Identifier: MIT

fn main() {
    odata_batch::run();
}
